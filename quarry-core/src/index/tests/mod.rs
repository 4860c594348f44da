mod basic;
mod search;
