mod crew;
mod fleet;

pub use crew::{CrewController, CrewMember};
pub use fleet::FleetController;
