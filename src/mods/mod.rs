mod registry;
mod workshop;

pub use registry::{
    CollectionLookup, ImportReport, ItemLookup, ModError, ModList, ModRegistry, MODS_KEY,
    WORKSHOP_ITEMS_KEY,
};
pub use workshop::{ItemDetails, SteamWorkshopClient, WorkshopError, WorkshopProvider};
