//! Integration tests, one module per concern.

#[cfg(test)]
mod failures;
