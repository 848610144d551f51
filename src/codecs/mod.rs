// src/codecs/mod.rs
//
// Pixel-level building blocks shared by the decode, encode and transform paths.

pub mod pixel;
