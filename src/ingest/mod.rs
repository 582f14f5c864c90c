pub mod chunk_reader;
pub mod shard;
pub mod pipeline;
