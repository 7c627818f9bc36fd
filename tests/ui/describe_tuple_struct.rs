#![allow(dead_code)]
use mmg_activator::Describe;

#[derive(Describe)]
struct Pair(u32, u32);

fn main() {}
