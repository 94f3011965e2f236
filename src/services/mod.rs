pub mod catalog;
pub mod editor;
pub mod gateway;
pub mod itinerary;
pub mod relations;
pub mod storage;
pub mod trips;
