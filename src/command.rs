//! The catalog of named device commands.
//!
//! A [`CommandTable`] is loaded once from a tab separated descriptor with the columns
//! `name`, `reg` (hex), `dec`, `dir` (`r`, `w` or `rw`) and an optional `unit`.
//! Lines starting with `#` are ignored. The SK120 map ships with the crate, see
//! [`CommandTable::sk120`].

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

static SK120_COMMANDS: &str = include_str!("commands.tsv");

/// The command descriptor could not be turned into a table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed command descriptor at line {line}: {reason}")]
pub struct DescriptorError {
    pub line: u64,
    pub reason: String,
}

/// No command with this name exists in the table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown command `{0}`")]
pub struct UnknownCommand(pub String);

/// Which ways a register may be accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
    ReadWrite,
}

impl Direction {
    pub fn readable(self) -> bool {
        matches!(self, Direction::Read | Direction::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, Direction::Write | Direction::ReadWrite)
    }
}

impl core::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" => Ok(Direction::Read),
            "w" => Ok(Direction::Write),
            "rw" => Ok(Direction::ReadWrite),
            other => Err(format!("direction `{other}` is not one of r, w, rw")),
        }
    }
}

/// A single named register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub address: u16,
    /// Number of implied decimal places in the raw register value.
    pub decimals: u8,
    pub direction: Direction,
    /// Engineering unit, informational only.
    pub unit: String,
}

#[derive(Debug, Deserialize)]
struct Row {
    name: String,
    reg: String,
    dec: String,
    dir: String,
    #[serde(default)]
    unit: String,
}

impl Row {
    fn into_command(self) -> Result<Command, String> {
        if self.name.is_empty() {
            return Err("empty command name".into());
        }
        let digits = self
            .reg
            .strip_prefix("0x")
            .or_else(|| self.reg.strip_prefix("0X"))
            .unwrap_or(&self.reg);
        let address = u16::from_str_radix(digits, 16)
            .map_err(|_| format!("address `{}` of {} is not a hex register", self.reg, self.name))?;
        let decimals = self
            .dec
            .parse::<u8>()
            .map_err(|_| format!("decimals `{}` of {} is not a number", self.dec, self.name))?;
        let direction = self.dir.parse()?;
        Ok(Command {
            name: self.name,
            address,
            decimals,
            direction,
            unit: self.unit,
        })
    }
}

/// Immutable lookup of commands by name. Keeps descriptor order for iteration.
#[derive(Debug, Clone)]
pub struct CommandTable {
    commands: Vec<Command>,
    by_name: HashMap<String, usize>,
}

impl CommandTable {
    /// The built-in SK120 register map.
    pub fn sk120() -> Result<Self, DescriptorError> {
        Self::from_tsv(SK120_COMMANDS)
    }

    /// Parse a descriptor held in memory.
    pub fn from_tsv(descriptor: &str) -> Result<Self, DescriptorError> {
        Self::from_reader(descriptor.as_bytes())
    }

    /// Parse a descriptor from any reader, e.g. an opened file.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, DescriptorError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers().map_err(csv_error)?.clone();
        let mut commands = Vec::new();
        let mut by_name = HashMap::new();
        let mut record = csv::StringRecord::new();

        while reader.read_record(&mut record).map_err(csv_error)? {
            let line = record.position().map_or(0, |p| p.line());
            // Trailing optional columns may be left off a row.
            while record.len() < headers.len() {
                record.push_field("");
            }
            let row: Row = record
                .deserialize(Some(&headers))
                .map_err(|err| DescriptorError {
                    line,
                    reason: err.to_string(),
                })?;
            let command = row
                .into_command()
                .map_err(|reason| DescriptorError { line, reason })?;

            if by_name.contains_key(&command.name) {
                return Err(DescriptorError {
                    line,
                    reason: format!("duplicate command `{}`", command.name),
                });
            }
            by_name.insert(command.name.clone(), commands.len());
            commands.push(command);
        }

        tracing::debug!(commands = commands.len(), "loaded command table");
        Ok(Self { commands, by_name })
    }

    /// Look a command up by name.
    pub fn resolve(&self, name: &str) -> Result<&Command, UnknownCommand> {
        self.by_name
            .get(name)
            .map(|&index| &self.commands[index])
            .ok_or_else(|| UnknownCommand(name.to_owned()))
    }

    /// All commands in descriptor order.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

fn csv_error(err: csv::Error) -> DescriptorError {
    DescriptorError {
        line: err.position().map_or(0, |p| p.line()),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_resolves() {
        let table = CommandTable::sk120().unwrap();

        let vset = table.resolve("V-SET").unwrap();
        assert_eq!(vset.address, 0x00);
        assert_eq!(vset.decimals, 2);
        assert_eq!(vset.direction, Direction::ReadWrite);
        assert_eq!(vset.unit, "V");

        let lock = table.resolve("LOCK").unwrap();
        assert_eq!(lock.address, 0x0F);
        assert_eq!(lock.unit, "");

        assert_eq!(table.resolve("S-ETP").unwrap().address, 0x5E);
        assert_eq!(table.resolve("VOUT").unwrap().direction, Direction::Read);
        assert_eq!(table.iter().next().unwrap().name, "V-SET");
    }

    #[test]
    fn unknown_command() {
        let table = CommandTable::sk120().unwrap();
        assert_eq!(
            table.resolve("NOPE").unwrap_err(),
            UnknownCommand("NOPE".into())
        );
    }

    #[test]
    fn custom_table() {
        let table = CommandTable::from_tsv("name\treg\tdec\tdir\nA\t10\t1\tr\nB\t0x0B\t0\tw\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve("A").unwrap().address, 0x10);
        assert!(!table.resolve("B").unwrap().direction.readable());
    }

    #[test]
    fn non_numeric_fields_are_rejected() {
        let err = CommandTable::from_tsv("name\treg\tdec\tdir\nA\tzz\t1\tr\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.reason.contains("zz"));

        let err = CommandTable::from_tsv("name\treg\tdec\tdir\nA\t0x01\ttwo\tr\n").unwrap_err();
        assert!(err.reason.contains("two"));

        assert!(CommandTable::from_tsv("name\treg\tdec\tdir\nA\t0x01\t1\tsideways\n").is_err());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err =
            CommandTable::from_tsv("name\treg\tdec\tdir\nA\t0x01\t1\tr\nA\t0x02\t1\tr\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.reason.contains("duplicate"));
    }

    #[test]
    fn unit_column_is_optional_per_row() {
        let table = CommandTable::from_tsv(
            "# comment\nname\treg\tdec\tdir\tunit\nA\t0x01\t2\trw\tV\nB\t0x02\t0\trw\nC\t0x03\t1\tr\t\n",
        )
        .unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.resolve("A").unwrap().unit, "V");
        assert_eq!(table.resolve("B").unwrap().unit, "");
        assert_eq!(table.resolve("B").unwrap().direction, Direction::ReadWrite);
        assert_eq!(table.resolve("C").unwrap().decimals, 1);
    }

    #[test]
    fn builtin_rows_without_unit_load() {
        let table = CommandTable::sk120().unwrap();
        for name in ["LOCK", "PROTECT", "ONOFF", "EXTRACT-M", "S-OAH_L", "S-INI"] {
            assert_eq!(table.resolve(name).unwrap().unit, "", "{name}");
        }
        assert_eq!(table.resolve("S-ETP").unwrap().unit, "deg");
    }

    #[test]
    fn missing_columns_are_rejected() {
        assert!(CommandTable::from_tsv("name\treg\tdec\tdir\nA\t0x01\n").is_err());
    }
}
