//! Text processing for the voice agent
//!
//! - **Response filter**: turns generated answers into text a synthesizer
//!   can read out (markup removed, technical abbreviations spelled out,
//!   unpronounceable characters dropped)
//!
//! # Example
//!
//! ```ignore
//! use voice_agent_text_processing::ResponseFilter;
//!
//! let filter = ResponseFilter::new();
//! assert_eq!(filter.filter("Restart your **VPN**"), "Restart your V P N");
//! ```

pub mod filter;
pub mod simplifier;

pub use filter::ResponseFilter;
pub use simplifier::AbbreviationExpander;
