use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

use crate::{Address, KartError, Result};

/// Release variant of the game, as stored in the cartridge header.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum GameRegion {
    Japan = 0,
    Us = 1,
    Europe = 2,
}

impl GameRegion {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(GameRegion::Japan),
            1 => Some(GameRegion::Us),
            2 => Some(GameRegion::Europe),
            _ => None,
        }
    }

    /// The Japanese and European decompressors need the quirks-mode encoder.
    pub fn uses_codec_quirks(self) -> bool {
        self != GameRegion::Us
    }

    /// Only the US decompressor pins the bank byte while reading a stream,
    /// so only there must a compressed block stay inside one bank.
    pub fn requires_bank_aligned_blocks(self) -> bool {
        self == GameRegion::Us
    }

    fn column(self) -> usize {
        self as usize
    }
}

impl fmt::Display for GameRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameRegion::Japan => "Japan",
            GameRegion::Us => "US",
            GameRegion::Europe => "Europe",
        };
        f.write_str(name)
    }
}

pub const GP_TRACK_COUNT: usize = 20;
pub const BATTLE_TRACK_COUNT: usize = 4;
pub const TRACK_COUNT: usize = GP_TRACK_COUNT + BATTLE_TRACK_COUNT;
pub const THEME_COUNT: usize = 8;

/// Named ROM locations the editor reads from and writes to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub enum OffsetName {
    ModeStrings,
    GpTrackOrder,
    BattleTrackOrder,
    GpTrackNames,
    BattleTrackNames,
    TrackMapsIndex,
    TrackMaps,
    TrackAiZones,
    TrackAiTargets,
    BattleTrackStartPositions,
    TrackPreviewLapLines,
    TrackOverlayPatterns,
    TrackOverlaySizes,
    TrackThemes,
    ThemeRoadGraphics,
    ThemeBackgroundGraphics,
    ThemePalettes,
}

impl OffsetName {
    pub const COUNT: usize = 17;

    pub const ALL: [OffsetName; OffsetName::COUNT] = [
        OffsetName::ModeStrings,
        OffsetName::GpTrackOrder,
        OffsetName::BattleTrackOrder,
        OffsetName::GpTrackNames,
        OffsetName::BattleTrackNames,
        OffsetName::TrackMapsIndex,
        OffsetName::TrackMaps,
        OffsetName::TrackAiZones,
        OffsetName::TrackAiTargets,
        OffsetName::BattleTrackStartPositions,
        OffsetName::TrackPreviewLapLines,
        OffsetName::TrackOverlayPatterns,
        OffsetName::TrackOverlaySizes,
        OffsetName::TrackThemes,
        OffsetName::ThemeRoadGraphics,
        OffsetName::ThemeBackgroundGraphics,
        OffsetName::ThemePalettes,
    ];
}

/// Per-region literals, columns ordered Japan, US, Europe.
const LITERALS: &[(OffsetName, [u32; 3])] = &[
    (OffsetName::ModeStrings, [0x58B19, 0x58B00, 0x58AF2]),
    (OffsetName::GpTrackOrder, [0x1EC1B, 0x1EC19, 0x1EC04]),
    (OffsetName::BattleTrackOrder, [0x1C15C, 0x1C022, 0x1BF0A]),
    (OffsetName::GpTrackNames, [0x1C8D5, 0x1C79B, 0x1C683]),
    (OffsetName::TrackMapsIndex, [0x1E74D, 0x1E749, 0x1E734]),
    (OffsetName::TrackAiZones, [0x1FF8C, 0x1FF9B, 0x1FF9F]),
    (OffsetName::BattleTrackStartPositions, [0x18B5F, 0x18B4B, 0x18B64]),
    (OffsetName::TrackPreviewLapLines, [0x1C886, 0x1C74C, 0x1C634]),
    (OffsetName::TrackOverlayPatterns, [0x4F0B5, 0x4F23D, 0x4F159]),
    (OffsetName::TrackThemes, [0x1D6A7, 0x1D58D, 0x1D475]),
    (OffsetName::ThemeRoadGraphics, [0x3FFE9, 0x3FFE9, 0x3FFE9]),
    (OffsetName::ThemePalettes, [0x3FF83, 0x3FF83, 0x3FF83]),
];

/// The literal value of `name` for `region`, if it is not derived.
pub fn literal(region: GameRegion, name: OffsetName) -> Option<Address> {
    LITERALS
        .iter()
        .find(|(entry, _)| *entry == name)
        .and_then(|(_, values)| Address::new(values[region.column()]).ok())
}

#[derive(Copy, Clone, Debug)]
enum Derivation {
    /// Another offset plus a fixed record size.
    Relative(OffsetName, u32),
    /// The address stored in the ROM at another offset.
    Indirect(OffsetName),
}

/// Second pass, in dependency order.
const DERIVED: &[(OffsetName, Derivation)] = &[
    (
        OffsetName::BattleTrackNames,
        Derivation::Relative(OffsetName::GpTrackNames, (GP_TRACK_COUNT * 2) as u32),
    ),
    (OffsetName::TrackMaps, Derivation::Indirect(OffsetName::TrackMapsIndex)),
    (
        OffsetName::TrackAiTargets,
        Derivation::Relative(OffsetName::TrackAiZones, (TRACK_COUNT * 3) as u32),
    ),
    (
        OffsetName::TrackOverlaySizes,
        Derivation::Relative(OffsetName::TrackOverlayPatterns, 0x147),
    ),
    (
        OffsetName::ThemeBackgroundGraphics,
        Derivation::Relative(OffsetName::ThemeRoadGraphics, (THEME_COUNT * 3) as u32),
    ),
];

/// Every named location resolved for one ROM. Built once at load time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OffsetTable {
    region: GameRegion,
    entries: [Address; OffsetName::COUNT],
}

impl OffsetTable {
    pub fn load(region: GameRegion, rom: &[u8]) -> Result<Self> {
        let mut resolved: [Option<Address>; OffsetName::COUNT] = [None; OffsetName::COUNT];

        for (name, values) in LITERALS {
            resolved[*name as usize] = Some(Address::new(values[region.column()])?);
        }

        for (name, derivation) in DERIVED {
            let value = match *derivation {
                Derivation::Relative(base, stride) => {
                    let base = resolved[base as usize].ok_or_else(|| unresolved(base))?;
                    Address::new(base.value() + stride)?
                }
                Derivation::Indirect(location) => {
                    let location = resolved[location as usize].ok_or_else(|| unresolved(location))?;
                    Address::read(rom, location.as_usize())?
                }
            };
            resolved[*name as usize] = Some(value);
        }

        let mut entries = [Address::default(); OffsetName::COUNT];
        for name in OffsetName::ALL {
            entries[name as usize] = resolved[name as usize].ok_or_else(|| unresolved(name))?;
        }

        Ok(OffsetTable { region, entries })
    }

    pub fn region(&self) -> GameRegion {
        self.region
    }

    pub fn get(&self, name: OffsetName) -> Address {
        self.entries[name as usize]
    }

    /// Name to hex string, for reports.
    pub fn to_map(&self) -> BTreeMap<OffsetName, String> {
        OffsetName::ALL
            .iter()
            .map(|name| (*name, self.get(*name).to_string()))
            .collect()
    }
}

fn unresolved(name: OffsetName) -> KartError {
    KartError::Config(format!("offset {name:?} has no definition"))
}

impl Index<OffsetName> for OffsetTable {
    type Output = Address;

    fn index(&self, name: OffsetName) -> &Address {
        &self.entries[name as usize]
    }
}

impl Serialize for OffsetTable {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}
