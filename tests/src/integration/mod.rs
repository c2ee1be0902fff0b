//! Cross-subsystem integration flows.

#[cfg(test)]
mod coordination;
#[cfg(test)]
mod flows;
#[cfg(test)]
mod harness;
