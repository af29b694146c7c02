//! MCU configuration file loaders (§6.5).
//!
//! `<MCU>.cfg` is a flat key=value file (comments start with `;`, `'`, `!`
//! or `#`). `<MCU>.io` is a sectioned device command table; each
//! `[DEVICE[,ALIAS...]]` header introduces CSV rows describing one device
//! command.

use crate::error::AsmError;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct McuConfig {
    pub ram_start: Option<u32>,
    pub ram_size: Option<u32>,
    pub rom_start: Option<u32>,
    pub rom_size: Option<u32>,
    pub extensions: Option<String>,
    pub lib: Option<String>,
    pub interrupt_names: HashMap<u32, String>,
    pub raw: HashMap<String, String>,
}

fn is_comment(line: &str) -> bool {
    matches!(line.trim().chars().next(), Some(';') | Some('\'') | Some('!') | Some('#'))
}

impl McuConfig {
    pub fn parse(text: &str) -> Result<McuConfig, AsmError> {
        let mut cfg = McuConfig::default();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || is_comment(line) {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| AsmError::Syntax {
                line: lineno as u32 + 1,
                detail: format!("expected key=value, got `{line}`"),
            })?;
            let key = key.trim().to_uppercase();
            let value = value.trim().to_string();

            if let Some(rest) = key.strip_prefix("INT").and_then(|k| k.strip_suffix("_NAME")) {
                if let Ok(n) = rest.parse::<u32>() {
                    cfg.interrupt_names.insert(n, value.clone());
                    cfg.raw.insert(key, value);
                    continue;
                }
            }

            match key.as_str() {
                "RAM_START" => cfg.ram_start = parse_num(&value),
                "RAM_SIZE" => cfg.ram_size = parse_num(&value),
                "ROM_START" => cfg.rom_start = parse_num(&value),
                "ROM_SIZE" => cfg.rom_size = parse_num(&value),
                "EXTENSIONS" => cfg.extensions = Some(value.clone()),
                "LIB" => cfg.lib = Some(value.clone()),
                _ => {}
            }
            cfg.raw.insert(key, value);
        }
        Ok(cfg)
    }
}

fn parse_num(text: &str) -> Option<u32> {
    let t = text.trim();
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        t.parse().ok()
    }
}

/// One row of a device's command table.
#[derive(Debug, Clone)]
pub struct DeviceCommand {
    pub name: String,
    pub id: i64,
    pub call_type: String,
    pub ret_type: String,
    pub code_place: String,
    pub file_name: String,
    pub mask: String,
    pub accepts_data: bool,
    pub data_type: String,
    pub extra_data: String,
    pub predef_only: bool,
    pub values: Vec<(String, String)>,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct IoTable {
    pub devices: HashMap<String, Vec<DeviceCommand>>,
    pub aliases: HashMap<String, String>,
}

impl IoTable {
    pub fn parse(text: &str) -> Result<IoTable, AsmError> {
        let mut table = IoTable::default();
        let mut current: Option<String> = None;

        for (lineno, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || is_comment(line) {
                continue;
            }
            if let Some(inner) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let mut names = inner.split(',').map(|s| s.trim().to_uppercase());
                let primary = names.next().ok_or_else(|| AsmError::Syntax {
                    line: lineno as u32 + 1,
                    detail: "empty device section header".into(),
                })?;
                table.devices.entry(primary.clone()).or_default();
                for alias in names {
                    table.aliases.insert(alias, primary.clone());
                }
                current = Some(primary);
                continue;
            }

            let device = current.clone().ok_or_else(|| AsmError::Syntax {
                line: lineno as u32 + 1,
                detail: "device command row before any [DEVICE] section".into(),
            })?;
            let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();
            if fields.len() < 11 {
                return Err(AsmError::Syntax {
                    line: lineno as u32 + 1,
                    detail: format!("device command row has {} fields, need at least 11", fields.len()),
                });
            }
            let mut values = Vec::new();
            let values_count: usize = fields[11].parse().unwrap_or(0);
            let mut idx = 12;
            for _ in 0..values_count {
                if idx + 1 >= fields.len() {
                    break;
                }
                values.push((fields[idx].to_string(), fields[idx + 1].to_string()));
                idx += 2;
            }
            let default_value = fields.get(idx).map(|s| s.to_string());

            let cmd = DeviceCommand {
                name: fields[0].to_string(),
                id: fields[1].parse().unwrap_or(0),
                call_type: fields[2].to_string(),
                ret_type: fields[3].to_string(),
                code_place: fields[4].to_string(),
                file_name: fields[5].to_string(),
                mask: fields[6].to_string(),
                accepts_data: fields[7] == "1" || fields[7].eq_ignore_ascii_case("true"),
                data_type: fields[8].to_string(),
                extra_data: fields[9].to_string(),
                predef_only: fields[10] == "1" || fields[10].eq_ignore_ascii_case("true"),
                values,
                default_value,
            };
            table.devices.entry(device).or_default().push(cmd);
        }

        Ok(table)
    }

    pub fn resolve_device<'a>(&'a self, name: &str) -> Option<&'a str> {
        let upper = name.to_uppercase();
        if self.devices.contains_key(&upper) {
            return self.devices.keys().find(|k| **k == upper).map(|s| s.as_str());
        }
        self.aliases.get(&upper).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_cfg() {
        let text = "; a comment\nRAM_START = 0x20000000\nRAM_SIZE=0x800\nEXTENSIONS=IC\nINT0_NAME=usart_irq\n";
        let cfg = McuConfig::parse(text).unwrap();
        assert_eq!(cfg.ram_start, Some(0x2000_0000));
        assert_eq!(cfg.ram_size, Some(0x800));
        assert_eq!(cfg.extensions.as_deref(), Some("IC"));
        assert_eq!(cfg.interrupt_names[&0], "usart_irq");
    }

    #[test]
    fn parses_io_table_with_aliases() {
        let text = "[UART,COM1]\nSEND,1,sub,none,inline,uart.inc,0xFF,1,VARREF,,0,0,\n";
        let table = IoTable::parse(text).unwrap();
        assert_eq!(table.resolve_device("COM1"), Some("UART"));
        let cmds = &table.devices["UART"];
        assert_eq!(cmds[0].name, "SEND");
        assert!(cmds[0].accepts_data);
    }
}
