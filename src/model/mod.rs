#[macro_use]
mod macros;

pub mod auction;
pub mod territory;
pub mod wire;

pub use auction::{Auction, AuctionKind, AuctionStatus, Bid, ProtectionTerm};
pub use territory::{Sovereignty, Territory};
pub use wire::{WireAuction, WireError, WireTerritory, auction_from_value, territory_from_value};
