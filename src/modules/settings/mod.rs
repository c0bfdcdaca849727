pub mod accounts;
pub mod cli;

#[cfg(test)]
mod tests;
