//! Data models for the gateway surface and the Gemini API

pub mod gateway;
pub mod gemini;
