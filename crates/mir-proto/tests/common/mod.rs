pub mod id3_builder;
