//! Integration tests for the patch sets shipped in `patches/`.

mod monterey_patches;
