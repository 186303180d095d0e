use crossterm::style::Color;

/// How a shape looks on the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
  pub ch: char,
  pub color: Color,
}

impl Glyph {
  const fn new(ch: char, color: Color) -> Self {
    Self { ch, color }
  }
}

pub const SHAPE_COUNT: usize = 8;

/// The global shape set. Level files index into this.
pub const SHAPES: [Glyph; SHAPE_COUNT] = [
  Glyph::new('●', Color::Red),
  Glyph::new('■', Color::Blue),
  Glyph::new('▲', Color::Green),
  Glyph::new('◆', Color::Yellow),
  Glyph::new('★', Color::Magenta),
  Glyph::new('♥', Color::DarkRed),
  Glyph::new('♣', Color::Cyan),
  Glyph::new('✚', Color::White),
];
