pub mod spill;
pub mod resolver;
pub mod redirect_store;
pub mod column_resolver;
pub mod edition_work_map;
pub mod relinker;
