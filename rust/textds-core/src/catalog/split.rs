// rust/textds-core/src/catalog/split.rs

//! Split selection strings.
//!
//! A selection is one or more read instructions joined by `+`. Each
//! instruction names a split and optionally slices it:
//!
//! ```text
//! train                 whole split
//! train[:100]           first 100 examples
//! train[10:]            all but the first 10
//! train[-5:]            last 5
//! train[25%:75%]        middle half, boundaries rounded to the nearest example
//! train[:10%]+test      concatenation
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::error::{Result, TextDsError};

/// One end of a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitBound {
    /// Example index; negative values count from the end.
    Absolute(i64),
    /// Percentage of the split in `-100..=100`.
    Percent(i64),
}

impl SplitBound {
    fn resolve(self, len: u64) -> u64 {
        let len_i = len as i64;
        let index = match self {
            SplitBound::Absolute(i) => i,
            SplitBound::Percent(p) => {
                // Round half away from zero
                let scaled = len_i * p;
                let rounded = (scaled.abs() + 50) / 100;
                if scaled < 0 {
                    -rounded
                } else {
                    rounded
                }
            }
        };
        let index = if index < 0 { len_i + index } else { index };
        index.clamp(0, len_i) as u64
    }
}

impl fmt::Display for SplitBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitBound::Absolute(i) => write!(f, "{i}"),
            SplitBound::Percent(p) => write!(f, "{p}%"),
        }
    }
}

/// A (possibly sliced) reference to one split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadInstruction {
    pub split: String,
    pub from: Option<SplitBound>,
    pub to: Option<SplitBound>,
}

impl ReadInstruction {
    pub fn whole(split: impl Into<String>) -> Self {
        Self {
            split: split.into(),
            from: None,
            to: None,
        }
    }

    /// Example range selected from a split of `len` examples.
    pub fn range(&self, len: u64) -> Range<u64> {
        let start = self.from.map_or(0, |b| b.resolve(len));
        let end = self.to.map_or(len, |b| b.resolve(len));
        start..end.max(start)
    }

    pub fn is_sliced(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }
}

impl fmt::Display for ReadInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.split)?;
        if self.is_sliced() {
            f.write_str("[")?;
            if let Some(from) = self.from {
                write!(f, "{from}")?;
            }
            f.write_str(":")?;
            if let Some(to) = self.to {
                write!(f, "{to}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

/// A parsed split selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSpec {
    source: String,
    instructions: Vec<ReadInstruction>,
}

impl SplitSpec {
    pub fn instructions(&self) -> &[ReadInstruction] {
        &self.instructions
    }

    /// Resolves every instruction against the known split sizes.
    ///
    /// Returns `(split, range)` pairs in selection order.
    pub fn resolve(&self, splits: &BTreeMap<String, u64>) -> Result<Vec<(String, Range<u64>)>> {
        self.instructions
            .iter()
            .map(|instruction| {
                let len = splits.get(&instruction.split).ok_or_else(|| {
                    TextDsError::split(
                        &self.source,
                        format!("unknown split '{}'", instruction.split),
                        splits.keys().cloned().collect(),
                    )
                })?;
                Ok((instruction.split.clone(), instruction.range(*len)))
            })
            .collect()
    }

    fn malformed(&self, message: impl Into<String>) -> TextDsError {
        TextDsError::split(&self.source, message, Vec::new())
    }

    fn parse_instruction(&self, part: &str) -> Result<ReadInstruction> {
        let part = part.trim();
        let (name, slice) = match part.find('[') {
            Some(open) => {
                let slice = part[open + 1..]
                    .strip_suffix(']')
                    .ok_or_else(|| self.malformed(format!("unterminated slice in '{part}'")))?;
                (&part[..open], Some(slice))
            }
            None => (part, None),
        };

        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(self.malformed(format!("invalid split name '{name}'")));
        }

        let mut instruction = ReadInstruction::whole(name);
        if let Some(slice) = slice {
            let (from, to) = slice
                .split_once(':')
                .ok_or_else(|| self.malformed(format!("slice '{slice}' needs a ':'")))?;
            instruction.from = self.parse_bound(from)?;
            instruction.to = self.parse_bound(to)?;
        }
        Ok(instruction)
    }

    fn parse_bound(&self, text: &str) -> Result<Option<SplitBound>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let (digits, percent) = match text.strip_suffix('%') {
            Some(digits) => (digits.trim(), true),
            None => (text, false),
        };
        let value: i64 = digits
            .parse()
            .map_err(|_| self.malformed(format!("invalid slice bound '{text}'")))?;

        if percent {
            if !(-100..=100).contains(&value) {
                return Err(self.malformed(format!("percent bound '{text}' outside -100%..100%")));
            }
            Ok(Some(SplitBound::Percent(value)))
        } else {
            Ok(Some(SplitBound::Absolute(value)))
        }
    }
}

impl FromStr for SplitSpec {
    type Err = TextDsError;

    fn from_str(s: &str) -> Result<Self> {
        let mut spec = SplitSpec {
            source: s.to_string(),
            instructions: Vec::new(),
        };
        if s.trim().is_empty() {
            return Err(spec.malformed("empty split selection"));
        }
        let instructions = s
            .split('+')
            .map(|part| spec.parse_instruction(part))
            .collect::<Result<Vec<_>>>()?;
        spec.instructions = instructions;
        Ok(spec)
    }
}

impl fmt::Display for SplitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.instructions.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join("+"))
    }
}
