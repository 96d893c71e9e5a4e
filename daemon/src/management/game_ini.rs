use crate::management::AdapterError;
use crate::storage::file::write_replace;
use crate::storage::paths::join_segments;
use encoding::{all, DecoderTrap, EncoderTrap, Encoding as _, EncodingRef};
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use satisfactory_protocol::game::{CONFIG_DIR, GAME_INI, MAX_PLAYERS_KEY, SESSION_SECTION};
use std::borrow::Cow;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref SECTION_PATTERN: Regex = Regex::new(r"^\s*\[(?P<name>[^\]]*)\]\s*$")
        .expect("Failed to compile SECTION_PATTERN regex");
    static ref ASSIGNMENT_PATTERN: Regex =
        Regex::new(r"^(?P<indent>\s*)(?P<key>[^=;#\[\s][^=]*?)\s*=(?P<value>.*)$")
            .expect("Failed to compile ASSIGNMENT_PATTERN regex");
}

const BOM: char = '\u{feff}';

/// How an ini file is stored on disk. A rewrite keeps the same encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileEncoding {
    Utf8,
    /// marked with `FF FE`
    Utf16Le,
    /// marked with `FE FF`
    Utf16Be,
    /// neither utf-8 nor marked; every byte maps to one char and back
    Bytes,
}

impl FileEncoding {
    fn detect(bytes: &[u8]) -> Self {
        match bytes {
            [0xFF, 0xFE, ..] => FileEncoding::Utf16Le,
            [0xFE, 0xFF, ..] => FileEncoding::Utf16Be,
            _ if std::str::from_utf8(bytes).is_ok() => FileEncoding::Utf8,
            _ => FileEncoding::Bytes,
        }
    }

    fn utf16(self) -> Option<(EncodingRef, [u8; 2])> {
        match self {
            FileEncoding::Utf16Le => Some((all::UTF_16LE as EncodingRef, [0xFF, 0xFE])),
            FileEncoding::Utf16Be => Some((all::UTF_16BE as EncodingRef, [0xFE, 0xFF])),
            FileEncoding::Utf8 | FileEncoding::Bytes => None,
        }
    }

    fn decode(self, bytes: &[u8]) -> Result<String, Cow<'static, str>> {
        if let Some((encoding, bom)) = self.utf16() {
            let body = bytes.strip_prefix(&bom[..]).unwrap_or(bytes);
            return encoding.decode(body, DecoderTrap::Strict);
        }
        match self {
            FileEncoding::Bytes => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            _ => String::from_utf8(bytes.to_vec()).map_err(|err| err.to_string().into()),
        }
    }

    fn encode(self, text: &str) -> Result<Vec<u8>, Cow<'static, str>> {
        if let Some((encoding, bom)) = self.utf16() {
            let mut bytes = bom.to_vec();
            bytes.extend(encoding.encode(text, EncoderTrap::Strict)?);
            return Ok(bytes);
        }
        match self {
            FileEncoding::Bytes => text
                .chars()
                .map(|c| {
                    u8::try_from(c)
                        .map_err(|_| Cow::from(format!("{:?} does not fit in one byte", c)))
                })
                .collect(),
            _ => Ok(text.as_bytes().to_vec()),
        }
    }
}

fn invalid_data(path: &Path, reason: Cow<'static, str>) -> AdapterError {
    AdapterError::io(path)(io::Error::new(
        io::ErrorKind::InvalidData,
        reason.into_owned(),
    ))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LineKind {
    Section(String),
    Assignment { key: String },
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct IniLine {
    text: String,
    ending: String,
    kind: LineKind,
}

impl IniLine {
    fn parse(raw: &str) -> Self {
        let (text, ending) = if let Some(text) = raw.strip_suffix("\r\n") {
            (text, "\r\n")
        } else if let Some(text) = raw.strip_suffix('\n') {
            (text, "\n")
        } else {
            (raw, "")
        };
        let kind = if let Some(caps) = SECTION_PATTERN.captures(text) {
            LineKind::Section(caps["name"].trim().to_string())
        } else if let Some(caps) = ASSIGNMENT_PATTERN.captures(text) {
            LineKind::Assignment {
                key: caps["key"].to_string(),
            }
        } else {
            LineKind::Other
        };
        IniLine {
            text: text.to_string(),
            ending: ending.to_string(),
            kind,
        }
    }

    fn section(name: &str, ending: &str) -> Self {
        IniLine {
            text: format!("[{}]", name),
            ending: ending.to_string(),
            kind: LineKind::Section(name.to_string()),
        }
    }

    fn assignment(indent: &str, key: &str, value: &str, ending: &str) -> Self {
        IniLine {
            text: format!("{}{}={}", indent, key, value),
            ending: ending.to_string(),
            kind: LineKind::Assignment {
                key: key.to_string(),
            },
        }
    }

    fn is_key(&self, key: &str) -> bool {
        matches!(&self.kind, LineKind::Assignment { key: k } if k == key)
    }

    fn is_section(&self, name: &str) -> bool {
        matches!(&self.kind, LineKind::Section(n) if n == name)
    }
}

/// Line-preserving view of an unreal-style ini file.
///
/// Lines that are not touched by [`GameIni::set`] serialize back exactly as
/// they were read, including their line endings and a leading BOM.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameIni {
    bom: bool,
    newline: String,
    lines: Vec<IniLine>,
}

impl GameIni {
    pub fn parse(content: &str) -> Self {
        let (bom, content) = match content.strip_prefix(BOM) {
            Some(rest) => (true, rest),
            None => (false, content),
        };
        let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
        GameIni {
            bom,
            newline: newline.to_string(),
            lines: content.split_inclusive('\n').map(IniLine::parse).collect(),
        }
    }

    fn newline(&self) -> &str {
        if self.newline.is_empty() {
            "\n"
        } else {
            &self.newline
        }
    }

    /// Value of the first assignment of `key`, in any section.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines
            .iter()
            .find(|line| line.is_key(key))
            .and_then(|line| line.text.split_once('='))
            .map(|(_, value)| value)
    }

    /// Makes `key=value` the only assignment of `key`.
    ///
    /// The first existing assignment is rewritten in place and later ones are
    /// dropped. Without any, the assignment goes right below the `section`
    /// header, or a new section is appended. Returns whether the document
    /// changed.
    pub fn set(&mut self, section: &str, key: &str, value: &str) -> bool {
        let newline = self.newline().to_string();
        let positions: Vec<usize> = self
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.is_key(key))
            .map(|(i, _)| i)
            .collect();

        match positions.split_first() {
            Some((&first, duplicates)) => {
                let before = self.lines.clone();
                let line = &self.lines[first];
                let indent = ASSIGNMENT_PATTERN
                    .captures(&line.text)
                    .map(|caps| caps["indent"].to_string())
                    .unwrap_or_default();
                let replacement = IniLine::assignment(&indent, key, value, &line.ending);
                self.lines[first] = replacement;

                if !duplicates.is_empty() {
                    warn!(
                        "dropping {} duplicate {} assignment(s) from {}",
                        duplicates.len(),
                        key,
                        GAME_INI
                    );
                    for &i in duplicates.iter().rev() {
                        self.lines.remove(i);
                    }
                    if let (Some(last), Some(original)) = (self.lines.last_mut(), before.last()) {
                        // keep the file's trailing newline (or lack of it)
                        last.ending = original.ending.clone();
                    }
                }
                before != self.lines
            }
            None => {
                match self.lines.iter().position(|line| line.is_section(section)) {
                    Some(header) => {
                        if self.lines[header].ending.is_empty() {
                            self.lines[header].ending = newline.clone();
                        }
                        self.lines
                            .insert(header + 1, IniLine::assignment("", key, value, &newline));
                    }
                    None => {
                        if let Some(last) = self.lines.last_mut() {
                            if last.ending.is_empty() {
                                last.ending = newline.clone();
                            }
                        }
                        self.lines.push(IniLine::section(section, &newline));
                        self.lines
                            .push(IniLine::assignment("", key, value, &newline));
                    }
                }
                true
            }
        }
    }
}

impl fmt::Display for GameIni {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bom {
            write!(f, "{}", BOM)?;
        }
        for line in &self.lines {
            write!(f, "{}{}", line.text, line.ending)?;
        }
        Ok(())
    }
}

/// Directory of `Game.ini` below an instance root.
pub fn config_dir(root: &Path) -> PathBuf {
    join_segments(root, CONFIG_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    config_dir(root).join(GAME_INI)
}

/// Brings `MaxPlayers` in the instance's `Game.ini` in line with `max_players`,
/// creating the config directory and file when missing.
pub async fn sync(root: &Path, max_players: u32) -> Result<PathBuf, AdapterError> {
    let dir = config_dir(root);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(AdapterError::io(&dir))?;

    let path = config_path(root);
    let (mut ini, encoding, existed) = match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let encoding = FileEncoding::detect(&bytes);
            if encoding != FileEncoding::Utf8 {
                debug!("reading {} as {:?}", path.display(), encoding);
            }
            let content = encoding
                .decode(&bytes)
                .map_err(|reason| invalid_data(&path, reason))?;
            (GameIni::parse(&content), encoding, true)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            (GameIni::default(), FileEncoding::Utf8, false)
        }
        Err(err) => return Err(AdapterError::io(&path)(err)),
    };

    let previous = ini.get(MAX_PLAYERS_KEY).map(str::to_owned);
    let changed = ini.set(SESSION_SECTION, MAX_PLAYERS_KEY, &max_players.to_string());
    if !changed {
        debug!("{} already has {}={}", path.display(), MAX_PLAYERS_KEY, max_players);
        return Ok(path);
    }

    let content = encoding
        .encode(&ini.to_string())
        .map_err(|reason| invalid_data(&path, reason))?;
    write_replace(&path, content)
        .await
        .map_err(AdapterError::io(&path))?;
    if existed {
        info!(
            "updated {} in {} ({} -> {})",
            MAX_PLAYERS_KEY,
            path.display(),
            previous.as_deref().unwrap_or("unset"),
            max_players
        );
    } else {
        info!("created {} with {}={}", path.display(), MAX_PLAYERS_KEY, max_players);
    }
    Ok(path)
}
