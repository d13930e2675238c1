//! Heuristic channel classification for buffer passes.
//!
//! ShaderToy pastes carry no declaration of what `iChannel0..3` should be
//! bound to, so we score each reference's surrounding text against three
//! usage profiles (procedural noise lookup, screen-space buffer read,
//! temporal self-feedback) and pick the most plausible source. There is no
//! correctness oracle here; a wrong guess degrades the picture, it does not
//! break the graph.

use crate::{PassKind, CHANNEL_COUNT};

// Pattern weights. One window can accumulate several hits.
const W_NOISE_POW2_DIV: u32 = 30;
const W_NOISE_TINY_MUL: u32 = 20;
const W_NOISE_SINGLE_COMPONENT: u32 = 25;
const W_BUFFER_SCREEN_COORD: u32 = 40;
const W_BUFFER_BARE_UV: u32 = 30;
const W_SELF_MIX: u32 = 35;
const W_SELF_ACCUMULATE: u32 = 25;

/// A noise score at or above this wins outright when it also dominates the
/// buffer and feedback scores.
const NOISE_DOMINANT_MIN: u32 = 50;

/// Bytes of context inspected on each side of an `iChannelN` reference.
const CONTEXT_WINDOW: usize = 96;

/// What one texture channel of a pass reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelBinding {
    /// Another pass's ping-pong output.
    Buffer(PassKind),
    /// The pass's own previous frame.
    SelfFeedback,
    /// The shared procedural noise texture.
    Noise,
    /// A caller-registered texture (the resolver never emits this).
    External,
    /// Explicitly cleared by the caller; rendered as noise.
    Unbound,
}

/// Independent confidence scores for one channel's references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelScores {
    pub noise: u32,
    pub buffer: u32,
    pub feedback: u32,
}

/// Resolves all four channels of a pass.
///
/// The Image pass is never scored: its channels mirror Buffer A-D in fixed
/// order, and the renderer substitutes noise for buffers the shader never
/// declared.
pub fn resolve_channels(kind: PassKind, body: &str) -> [ChannelBinding; CHANNEL_COUNT] {
    if kind == PassKind::Image {
        return [
            ChannelBinding::Buffer(PassKind::BufferA),
            ChannelBinding::Buffer(PassKind::BufferB),
            ChannelBinding::Buffer(PassKind::BufferC),
            ChannelBinding::Buffer(PassKind::BufferD),
        ];
    }
    std::array::from_fn(|channel| {
        let binding = resolve_channel(channel, body);
        tracing::debug!(pass = %kind, channel, ?binding, "resolved channel binding");
        binding
    })
}

fn resolve_channel(channel: usize, body: &str) -> ChannelBinding {
    let Some(scores) = score_channel(body, channel) else {
        // Unreferenced channels read noise; sampling it is harmless and
        // matches what most pastes expect of an unbound slot.
        return ChannelBinding::Noise;
    };

    let noise_dominant = scores.noise >= NOISE_DOMINANT_MIN
        && scores.noise > scores.buffer
        && scores.noise > scores.feedback;
    if noise_dominant {
        return ChannelBinding::Noise;
    }

    // ShaderToy convention: channel 0 on a buffer pass is almost always the
    // pass reading its own previous frame; channels 1-3 line up with the
    // preceding buffers.
    let conventional = match channel {
        0 => ChannelBinding::SelfFeedback,
        1 => ChannelBinding::Buffer(PassKind::BufferA),
        2 => ChannelBinding::Buffer(PassKind::BufferB),
        _ => ChannelBinding::Buffer(PassKind::BufferC),
    };

    if scores.buffer > 0 || scores.feedback > 0 {
        if channel == 0 && scores.noise < NOISE_DOMINANT_MIN {
            return ChannelBinding::SelfFeedback;
        }
        if scores.feedback > scores.buffer {
            ChannelBinding::SelfFeedback
        } else {
            conventional
        }
    } else {
        conventional
    }
}

/// Scores every reference to `iChannel<channel>` in `body`.
///
/// Returns `None` when the channel is never referenced. Scores accumulate
/// over references, so a channel sampled many times in a noise-like way
/// outweighs one stray screen-space read.
pub fn score_channel(body: &str, channel: usize) -> Option<ChannelScores> {
    let needle = format!("iChannel{channel}");
    let mut scores = ChannelScores::default();
    let mut referenced = false;

    for (offset, _) in body.match_indices(&needle) {
        // `iChannel1` must not match inside `iChannelResolution` or an
        // `iChannel10`-style identifier.
        let after = offset + needle.len();
        if body[after..]
            .chars()
            .next()
            .is_some_and(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            continue;
        }
        referenced = true;

        let window = context_window(body, offset, after);
        score_noise(window, &mut scores);
        score_buffer(window, &needle, &mut scores);
        score_feedback(window, &needle, &mut scores);
    }

    referenced.then_some(scores)
}

fn context_window(body: &str, start: usize, end: usize) -> &str {
    let mut lo = start.saturating_sub(CONTEXT_WINDOW);
    while !body.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = (end + CONTEXT_WINDOW).min(body.len());
    while !body.is_char_boundary(hi) {
        hi += 1;
    }
    &body[lo..hi]
}

fn score_noise(window: &str, scores: &mut ChannelScores) {
    const POW2_DIVISORS: [&str; 6] = ["/256", "/ 256", "/512", "/ 512", "/1024", "/ 1024"];
    if POW2_DIVISORS.iter().any(|pattern| window.contains(pattern)) {
        scores.noise += W_NOISE_POW2_DIV;
    }
    if window.contains("*0.0") || window.contains("* 0.0") {
        scores.noise += W_NOISE_TINY_MUL;
    }
    if window.contains(").x") || window.contains(").r") {
        scores.noise += W_NOISE_SINGLE_COMPONENT;
    }
}

fn score_buffer(window: &str, needle: &str, scores: &mut ChannelScores) {
    if window.contains("fragCoord") || window.contains("iResolution") {
        scores.buffer += W_BUFFER_SCREEN_COORD;
    }
    // A bare `uv`/`coord`/`pos` second argument reads like a full-surface
    // buffer fetch.
    for (offset, _) in window.match_indices(needle) {
        let rest = &window[offset + needle.len()..];
        let Some(args) = rest.strip_prefix(',').or_else(|| {
            rest.trim_start().strip_prefix(',')
        }) else {
            continue;
        };
        let Some(close) = args.find(')') else { continue };
        let argument = args[..close].trim();
        if matches!(argument, "uv" | "coord" | "pos" | "p" | "st") {
            scores.buffer += W_BUFFER_BARE_UV;
            break;
        }
    }
}

fn score_feedback(window: &str, needle: &str, scores: &mut ChannelScores) {
    // `mix(... iChannelN ...)` blending old and new state.
    let mixes = window
        .match_indices("mix(")
        .any(|(offset, _)| window[offset..].contains(needle));
    if mixes {
        scores.feedback += W_SELF_MIX;
    }
    if window.contains("+=") || window.contains("*=") {
        scores.feedback += W_SELF_ACCUMULATE;
    }
}
