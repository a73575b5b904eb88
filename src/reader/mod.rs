pub mod lru_cache;
pub mod searcher;
pub mod searcher_cache;
