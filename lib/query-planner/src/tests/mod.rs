mod arguments;
mod normalization;
mod requires;
