//! OSC message and argument types

use rosc::{OscPacket, OscType};
use std::fmt;

/// A single decoded OSC argument
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    /// `i`: 32-bit big-endian signed integer
    Int(i32),
    /// `f`: 32-bit big-endian IEEE-754 float
    Float(f32),
    /// `T` / `F`: boolean without payload
    Bool(bool),
    /// `s`: padded null-terminated string
    String(String),
}

impl OscArg {
    /// Type-tag character for this argument
    pub fn tag(&self) -> char {
        match self {
            OscArg::Int(_) => 'i',
            OscArg::Float(_) => 'f',
            OscArg::Bool(true) => 'T',
            OscArg::Bool(false) => 'F',
            OscArg::String(_) => 's',
        }
    }

    /// Parse a command-line value into the most specific argument type
    ///
    /// `42` -> Int, `1.5` -> Float, `true`/`false` -> Bool, anything else -> String.
    pub fn parse_cli(text: &str) -> Self {
        if let Ok(i) = text.parse::<i32>() {
            return OscArg::Int(i);
        }
        if let Ok(f) = text.parse::<f32>() {
            return OscArg::Float(f);
        }
        match text {
            "true" => OscArg::Bool(true),
            "false" => OscArg::Bool(false),
            _ => OscArg::String(text.to_string()),
        }
    }
}

impl From<&OscArg> for OscType {
    fn from(arg: &OscArg) -> Self {
        match arg {
            OscArg::Int(i) => OscType::Int(*i),
            OscArg::Float(f) => OscType::Float(*f),
            OscArg::Bool(b) => OscType::Bool(*b),
            OscArg::String(s) => OscType::String(s.clone()),
        }
    }
}

impl fmt::Display for OscArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OscArg::Int(i) => write!(f, "{}", i),
            OscArg::Float(v) => write!(f, "{}", v),
            OscArg::Bool(b) => write!(f, "{}", b),
            OscArg::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// A decoded OSC message
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    /// Address pattern, always starting with `/`
    pub address: String,
    /// Type tag string as received (`,if`), or empty when absent
    pub type_tag: String,
    /// Arguments decoded before the end of the tag or the first unsupported tag
    pub args: Vec<OscArg>,
}

impl OscMessage {
    /// Build a message whose type tag is derived from `args`
    pub fn new(address: impl Into<String>, args: Vec<OscArg>) -> Self {
        let mut type_tag = String::with_capacity(args.len() + 1);
        type_tag.push(',');
        type_tag.extend(args.iter().map(OscArg::tag));
        Self {
            address: address.into(),
            type_tag,
            args,
        }
    }

    /// The only argument used downstream
    pub fn first_arg(&self) -> Option<&OscArg> {
        self.args.first()
    }

    /// Wire form for `rosc::encoder`
    pub fn to_packet(&self) -> OscPacket {
        OscPacket::Message(rosc::OscMessage {
            addr: self.address.clone(),
            args: self.args.iter().map(OscType::from).collect(),
        })
    }
}

impl fmt::Display for OscMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.address, self.type_tag)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
