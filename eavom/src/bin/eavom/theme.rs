//! Colors and glyphs shared by `output` and the help screens.

use colored::Color;

/// Role -> color mapping for terminal output.
///
/// Schema objects (attributes, choice groups) are drawn in the `schema` color,
/// commands and sample invocations in `command`.
pub struct Palette {
    pub saved: Color,
    pub rejected: Color,
    pub caution: Color,
    pub note: Color,
    pub heading: Color,
    pub faint: Color,
    pub schema: Color,
    pub command: Color,
    pub env_name: Color,
    pub env_text: Color,
}

pub const PALETTE: Palette = Palette {
    saved: Color::BrightGreen,
    rejected: Color::BrightRed,
    caution: Color::TrueColor { r: 230, g: 160, b: 40 },
    note: Color::Cyan,
    heading: Color::TrueColor { r: 120, g: 170, b: 230 },
    faint: Color::BrightBlack,
    schema: Color::BrightMagenta,
    command: Color::Green,
    env_name: Color::Yellow,
    env_text: Color::BrightWhite,
};

pub struct Glyphs {
    pub saved: &'static str,
    pub rejected: &'static str,
    pub caution: &'static str,
    pub note: &'static str,
    pub step: &'static str,
    pub item: &'static str,
}

/// ASCII only.
pub const GLYPHS: Glyphs = Glyphs {
    saved: "+",
    rejected: "x",
    caution: "!",
    note: "*",
    step: ">",
    item: "-",
};
