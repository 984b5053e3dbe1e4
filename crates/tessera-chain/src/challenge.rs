//! Challenge generation.
//!
//! A challenge is four symbols rendered into a noisy SVG image. The answer
//! is the lowercased symbols; the image travels inline as a data URL.

use std::fmt::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::Rng;

use tessera_core::Captcha;

use crate::config::ChallengeConfig;

/// A freshly generated challenge, ready to attach to a post.
pub type Challenge = Captcha;

/// Symbols a challenge is drawn from.
pub const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()";

/// Number of symbols per challenge.
pub const SYMBOLS: usize = 4;

/// Data URL prefix of challenge images.
pub const IMAGE_PREFIX: &str = "data:image/svg+xml;base64,";

const WIDTH: u32 = 700;
const HEIGHT: u32 = 146;

/// Renders challenges.
#[derive(Debug, Clone, Default)]
pub struct ChallengeGenerator {
    config: ChallengeConfig,
}

impl ChallengeGenerator {
    pub fn new(config: ChallengeConfig) -> Self {
        Self { config }
    }

    /// Generate a challenge using the thread-local RNG.
    pub fn generate(&self) -> Challenge {
        self.generate_with(&mut rand::thread_rng())
    }

    /// Generate a challenge from `rng`.
    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Challenge {
        let symbols: Vec<char> = (0..SYMBOLS)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();

        let svg = self.render(&symbols, rng);
        Challenge {
            answer: symbols.iter().collect::<String>().to_lowercase(),
            image: format!("{}{}", IMAGE_PREFIX, STANDARD.encode(svg)),
        }
    }

    fn render<R: Rng + ?Sized>(&self, symbols: &[char], rng: &mut R) -> String {
        let mut svg = String::with_capacity(1024 + self.config.speckles * 96);
        // Writing to a String cannot fail.
        let _ = write!(
            svg,
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><rect width="{w}" height="{h}" fill="#fff"/>"##,
            w = WIDTH,
            h = HEIGHT
        );

        for (i, symbol) in symbols.iter().enumerate() {
            let x = 200 + 90 * i as u32;
            let y = 90.0 + rng.gen::<f64>() * 8.0;
            let deg = rng.gen::<f64>() * 30.0;
            let _ = write!(
                svg,
                r#"<text transform="translate({x} {y:.2}) rotate({deg:.2})" font-family="arial" font-weight="bold" font-size="90" fill="{fill}">{glyph}</text>"#,
                fill = random_color(rng),
                glyph = escape(*symbol),
            );
        }

        for _ in 0..self.config.lines {
            let _ = write!(
                svg,
                r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{}"/>"#,
                rng.gen::<f64>() * WIDTH as f64,
                rng.gen::<f64>() * HEIGHT as f64,
                rng.gen::<f64>() * WIDTH as f64,
                rng.gen::<f64>() * HEIGHT as f64,
                random_color(rng),
            );
        }

        for _ in 0..self.config.speckles {
            let x = rng.gen::<f64>() * WIDTH as f64;
            let y = rng.gen::<f64>() * HEIGHT as f64;
            let _ = write!(
                svg,
                r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{}"/>"#,
                x,
                y,
                x + 1.0,
                y + 1.0,
                random_color(rng),
            );
        }

        svg.push_str("</svg>");
        svg
    }
}

fn random_color<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("rgb({},{},{})", rng.gen::<u8>(), rng.gen::<u8>(), rng.gen::<u8>())
}

fn escape(c: char) -> String {
    match c {
        '&' => "&amp;".into(),
        '<' => "&lt;".into(),
        '>' => "&gt;".into(),
        c => c.to_string(),
    }
}
