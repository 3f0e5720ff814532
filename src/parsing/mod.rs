pub mod rdf_parser;
