//! Land cover classification schemes and the NRFA aggregate classes.
//!
//! Each survey vintage uses its own class codes, so a class number is only
//! meaningful together with its scheme. The aggregate classes give a coarse
//! vocabulary shared by every vintage.
use serde::Serialize;

/// Class code recorded for cells the survey could not classify.
pub const UNKNOWN_CLASS: u16 = 9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ClassificationScheme {
    /// LCM2000 subclasses (level 2 of the LCM2000 hierarchy).
    #[serde(rename = "LCM2000 subclass")]
    Lcm2000Subclass,
    #[serde(rename = "LCM2007 class")]
    Lcm2007,
    #[serde(rename = "LCM2015 class")]
    Lcm2015,
}

const LCM2000_SUBCLASSES: &[(u16, &str)] = &[
    (11, "Broad-leaved / mixed woodland"),
    (21, "Coniferous woodland"),
    (41, "Arable cereals"),
    (42, "Arable horticulture"),
    (43, "Arable non-rotational"),
    (51, "Improved grassland"),
    (52, "Setaside grass"),
    (61, "Neutral grass"),
    (71, "Calcareous grass"),
    (81, "Acid grass"),
    (91, "Bracken"),
    (101, "Dense dwarf shrub heath"),
    (102, "Open dwarf shrub heath"),
    (111, "Fen, marsh, swamp"),
    (121, "Bog"),
    (131, "Water (inland)"),
    (151, "Montane habitats"),
    (161, "Inland bare ground"),
    (171, "Suburban / rural developed"),
    (172, "Continuous urban"),
    (181, "Supra-littoral rock"),
    (191, "Supra-littoral sediment"),
    (201, "Littoral rock"),
    (211, "Littoral sediment"),
    (212, "Saltmarsh"),
];

const LCM2007_CLASSES: &[(u16, &str)] = &[
    (1, "Broadleaved woodland"),
    (2, "Coniferous woodland"),
    (3, "Arable and horticulture"),
    (4, "Improved grassland"),
    (5, "Rough grassland"),
    (6, "Neutral grassland"),
    (7, "Calcareous grassland"),
    (8, "Acid grassland"),
    (9, "Fen, marsh and swamp"),
    (10, "Heather"),
    (11, "Heather grassland"),
    (12, "Bog"),
    (13, "Montane habitats"),
    (14, "Inland rock"),
    (15, "Saltwater"),
    (16, "Freshwater"),
    (17, "Supra-littoral rock"),
    (18, "Supra-littoral sediment"),
    (19, "Littoral rock"),
    (20, "Littoral sediment"),
    (21, "Saltmarsh"),
    (22, "Urban"),
    (23, "Suburban"),
];

const LCM2015_CLASSES: &[(u16, &str)] = &[
    (1, "Broadleaved woodland"),
    (2, "Coniferous woodland"),
    (3, "Arable and horticulture"),
    (4, "Improved grassland"),
    (5, "Neutral grassland"),
    (6, "Calcareous grassland"),
    (7, "Acid grassland"),
    (8, "Fen, marsh and swamp"),
    (9, "Heather"),
    (10, "Heather grassland"),
    (11, "Bog"),
    (12, "Inland rock"),
    (13, "Saltwater"),
    (14, "Freshwater"),
    (15, "Supra-littoral rock"),
    (16, "Supra-littoral sediment"),
    (17, "Littoral rock"),
    (18, "Littoral sediment"),
    (19, "Saltmarsh"),
    (20, "Urban"),
    (21, "Suburban"),
];

impl ClassificationScheme {
    pub fn name(self) -> &'static str {
        match self {
            Self::Lcm2000Subclass => "LCM2000 subclass",
            Self::Lcm2007 => "LCM2007 class",
            Self::Lcm2015 => "LCM2015 class",
        }
    }

    /// Every defined class as `(code, name)`, in code order.
    pub fn classes(self) -> &'static [(u16, &'static str)] {
        match self {
            Self::Lcm2000Subclass => LCM2000_SUBCLASSES,
            Self::Lcm2007 => LCM2007_CLASSES,
            Self::Lcm2015 => LCM2015_CLASSES,
        }
    }

    pub fn class_name(self, code: u16) -> Option<&'static str> {
        if code == UNKNOWN_CLASS {
            return Some("Unknown");
        }
        self.classes()
            .binary_search_by_key(&code, |(c, _)| *c)
            .ok()
            .map(|i| self.classes()[i].1)
    }

    pub fn is_defined(self, code: u16) -> bool {
        self.class_name(code).is_some()
    }
}

impl std::fmt::Display for ClassificationScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── NRFA aggregates ──────────────────────────────────────────────────────────

/// Coarse land cover groups used for national reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AggregateClass {
    Woodland,
    #[serde(rename = "Arable and Horticulture")]
    ArableHorticulture,
    Grassland,
    #[serde(rename = "Heath/Bog")]
    HeathBog,
    Bareground,
    #[serde(rename = "Inland Rock")]
    InlandRock,
    Water,
    Coastal,
    Urban,
    Unknown,
}

impl AggregateClass {
    pub const ALL: [AggregateClass; 10] = [
        Self::Woodland,
        Self::ArableHorticulture,
        Self::Grassland,
        Self::HeathBog,
        Self::Bareground,
        Self::InlandRock,
        Self::Water,
        Self::Coastal,
        Self::Urban,
        Self::Unknown,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Woodland => "Woodland",
            Self::ArableHorticulture => "Arable and Horticulture",
            Self::Grassland => "Grassland",
            Self::HeathBog => "Heath/Bog",
            Self::Bareground => "Bareground",
            Self::InlandRock => "Inland Rock",
            Self::Water => "Water",
            Self::Coastal => "Coastal",
            Self::Urban => "Urban",
            Self::Unknown => "Unknown",
        }
    }

    /// Member class codes of this aggregate under `scheme`.
    ///
    /// LCM2000 bog (121) belongs to Heath/Bog only, so the aggregate shares
    /// of a record still sum to one.
    pub fn members(self, scheme: ClassificationScheme) -> &'static [u16] {
        use ClassificationScheme::*;
        match (self, scheme) {
            (Self::Woodland, Lcm2000Subclass) => &[11, 21],
            (Self::Woodland, Lcm2007 | Lcm2015) => &[1, 2],

            (Self::ArableHorticulture, Lcm2000Subclass) => &[41, 42, 43],
            (Self::ArableHorticulture, Lcm2007 | Lcm2015) => &[3],

            (Self::Grassland, Lcm2000Subclass) => &[51, 52, 61, 71, 81, 91, 111],
            (Self::Grassland, Lcm2007) => &[4, 5, 6, 7, 8, 9],
            (Self::Grassland, Lcm2015) => &[4, 5, 6, 7, 8],

            (Self::HeathBog, Lcm2000Subclass) => &[101, 102, 121, 151],
            (Self::HeathBog, Lcm2007) => &[10, 11, 12, 13],
            (Self::HeathBog, Lcm2015) => &[9, 10, 11],

            (Self::Bareground, Lcm2000Subclass) => &[161],
            (Self::Bareground, _) => &[],

            (Self::InlandRock, Lcm2000Subclass) => &[],
            (Self::InlandRock, Lcm2007) => &[14],
            (Self::InlandRock, Lcm2015) => &[12],

            (Self::Water, Lcm2000Subclass) => &[131],
            (Self::Water, Lcm2007) => &[15, 16],
            (Self::Water, Lcm2015) => &[13, 14],

            (Self::Coastal, Lcm2000Subclass) => &[181, 191, 201, 211, 212],
            (Self::Coastal, Lcm2007) => &[17, 18, 19, 20, 21],
            (Self::Coastal, Lcm2015) => &[15, 16, 17, 18, 19],

            (Self::Urban, Lcm2000Subclass) => &[171, 172],
            (Self::Urban, Lcm2007) => &[22, 23],
            (Self::Urban, Lcm2015) => &[20, 21],

            (Self::Unknown, _) => &[UNKNOWN_CLASS],
        }
    }

    /// Aggregate a class code falls into. Codes outside the scheme count as
    /// `Unknown`.
    pub fn of(scheme: ClassificationScheme, code: u16) -> AggregateClass {
        Self::ALL
            .into_iter()
            .find(|a| a.members(scheme).contains(&code))
            .unwrap_or(Self::Unknown)
    }
}

impl std::fmt::Display for AggregateClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
