pub mod builder;
pub mod hdt_file;
pub mod header;
pub mod triples;
pub mod indexing {
    pub mod dictionary;
    pub mod sections;
}
