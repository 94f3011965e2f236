pub mod attraction;
pub mod city;
pub mod guide;
pub mod participant;
pub mod relation;
pub mod trip;
