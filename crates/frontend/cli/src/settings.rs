//! Persisted settings: the ROM list and the key-bind table.
//!
//! `settings.json` lives next to the executable. A missing file is
//! created with default key-binds and an empty ROM list on first run.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use vcs_atari2600::ConsoleInput;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RomEntry {
    pub file: String,
    /// Bank-switch tag: "", "2k", "4k", "f8", "fa", "f6", "e0", "f4", "ef".
    /// Empty means "guess from the ROM size".
    #[serde(rename = "bank-switching", default)]
    pub bank_switching: String,
    /// "yes", "no", or "" (off).
    #[serde(rename = "super-chip", default)]
    pub super_chip: String,
}

impl RomEntry {
    pub fn new(file: String) -> Self {
        Self {
            file,
            bank_switching: String::new(),
            super_chip: String::new(),
        }
    }

    pub fn super_chip_enabled(&self) -> bool {
        self.super_chip == "yes"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "key-binds", default = "default_key_binds")]
    pub key_binds: BTreeMap<String, String>,
    #[serde(default)]
    pub roms: Vec<RomEntry>,
    #[serde(skip)]
    path: PathBuf,
}

fn default_key_binds() -> BTreeMap<String, String> {
    [
        ("joystick up", "Up"),
        ("joystick down", "Down"),
        ("joystick left", "Left"),
        ("joystick right", "Right"),
        ("controller fire", "A"),
        ("select", "S"),
        ("reset", "R"),
        ("difficulty 1 toggle", "1"),
        ("difficulty 2 toggle", "2"),
        ("black and white toggle", "B"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            key_binds: default_key_binds(),
            roms: Vec::new(),
            path: PathBuf::new(),
        }
    }
}

impl Settings {
    /// The settings file next to the executable.
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("settings.json")
    }

    /// Load the settings, creating the file with defaults if missing.
    pub fn load_or_create(path: PathBuf) -> Result<Self> {
        if !path.is_file() {
            let mut settings = Settings {
                path: path.clone(),
                ..Settings::default()
            };
            settings
                .save()
                .with_context(|| format!("creating {}", path.display()))?;
            return Ok(settings);
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let mut settings: Settings = serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        settings.path = path;
        Ok(settings)
    }

    pub fn save(&mut self) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&self.path, contents)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }

    /// Resolve the key-bind table into `(input, key symbol)` pairs,
    /// warning about names that are missing or unrecognized.
    pub fn key_bindings(&self) -> Vec<(ConsoleInput, String)> {
        for name in self.key_binds.keys() {
            if ConsoleInput::from_config_name(name).is_none() {
                log::warn!("unrecognized key-bind name: {:?}", name);
            }
        }
        ConsoleInput::ALL
            .iter()
            .filter_map(|&input| match self.key_binds.get(input.config_name()) {
                Some(key) => Some((input, key.clone())),
                None => {
                    log::warn!("no key bound for {:?}", input.config_name());
                    None
                }
            })
            .collect()
    }

    /// Interactive ROM selection: list the known ROMs or take a path,
    /// re-asking until something loadable is chosen.
    pub fn choose_rom(&mut self) -> Result<RomEntry> {
        let stdin = io::stdin();
        if self.roms.is_empty() {
            println!("No ROM files found...");
            loop {
                let input = prompt(&stdin, "Input rom filepath: ")?;
                if Path::new(&input).is_file() {
                    return self.maybe_add_rom(input, &stdin);
                }
                println!("Invalid path");
            }
        }

        for (i, rom) in self.roms.iter().enumerate() {
            println!("{}. {}", i + 1, rom.file);
        }
        loop {
            let input = prompt(&stdin, "Select number or input rom filepath: ")?;
            match parse_choice(&input, self.roms.len()) {
                Choice::Number(i) => return Ok(self.roms[i].clone()),
                Choice::Path(p) if Path::new(&p).is_file() => {
                    return self.maybe_add_rom(p, &stdin);
                }
                Choice::OutOfRange => println!("Number out of range"),
                _ => println!("Invalid number or path"),
            }
        }
    }

    /// Offer to persist a freshly typed ROM path into the list.
    fn maybe_add_rom(&mut self, file: String, stdin: &io::Stdin) -> Result<RomEntry> {
        if let Some(existing) = self.roms.iter().find(|r| r.file == file) {
            return Ok(existing.clone());
        }
        let entry = RomEntry::new(file);
        loop {
            let answer = prompt(
                stdin,
                "would you like to add this new rom to your list? (y/n): ",
            )?;
            match answer.as_str() {
                "y" => {
                    self.roms.push(entry.clone());
                    self.save()?;
                    return Ok(entry);
                }
                "n" => return Ok(entry),
                _ => {}
            }
        }
    }
}

fn prompt(stdin: &io::Stdin, text: &str) -> Result<String> {
    print!("{}", text);
    io::stdout().flush()?;
    let mut line = String::new();
    stdin.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[derive(Debug, PartialEq, Eq)]
pub enum Choice {
    /// Zero-based index into the ROM list.
    Number(usize),
    OutOfRange,
    Path(String),
}

/// A menu answer is a 1-based list index when it parses as one, a path
/// otherwise.
pub fn parse_choice(input: &str, len: usize) -> Choice {
    match input.parse::<usize>() {
        Ok(n) if (1..=len).contains(&n) => Choice::Number(n - 1),
        Ok(_) => Choice::OutOfRange,
        Err(_) => Choice::Path(input.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_settings_shape() {
        let json = r#"{
            "key-binds": { "joystick up": "K_UP", "reset": "K_r" },
            "roms": [
                { "file": "combat.bin", "bank-switching": "", "super-chip": "" },
                { "file": "big.bin", "bank-switching": "f6", "super-chip": "yes" }
            ]
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.roms.len(), 2);
        assert_eq!(settings.roms[1].bank_switching, "f6");
        assert!(settings.roms[1].super_chip_enabled());
        assert!(!settings.roms[0].super_chip_enabled());
        assert_eq!(settings.key_binds["reset"], "K_r");
    }

    #[test]
    fn missing_groups_get_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert!(settings.roms.is_empty());
        assert_eq!(settings.key_binds["joystick up"], "Up");
        // all ten logical inputs resolve
        assert_eq!(settings.key_bindings().len(), 10);
    }

    #[test]
    fn default_serializes_round_trip() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.key_binds, settings.key_binds);
    }

    #[test]
    fn choice_parsing() {
        assert_eq!(parse_choice("1", 3), Choice::Number(0));
        assert_eq!(parse_choice("3", 3), Choice::Number(2));
        assert_eq!(parse_choice("4", 3), Choice::OutOfRange);
        assert_eq!(parse_choice("0", 3), Choice::OutOfRange);
        assert_eq!(
            parse_choice("roms/combat.bin", 3),
            Choice::Path("roms/combat.bin".into())
        );
    }
}
