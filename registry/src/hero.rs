//! Progressive "hero" frames cut from a template example.
//!
//! The site's landing animation shows a document being typed out. Each frame
//! is a prefix of the example markdown: front matter only, then the title,
//! then the opening paragraph, then the whole document.

/// Cut `example` into progressive frames.
///
/// Without a front matter block (two `---` fence lines) the whole document is
/// the only frame. Otherwise four frames are produced:
///
/// 0. the front matter block,
/// 1. plus the first non-blank body line,
/// 2. plus everything up to two lines past the first paragraph,
/// 3. the full example.
///
/// # Examples
///
/// ```
/// use presto_registry::hero::hero_frames;
///
/// let frames = hero_frames("---\ntitle: x\n---\n# Notice\n\nTo all.\n\nBody.\n");
/// assert_eq!(frames.len(), 4);
/// assert_eq!(frames[0], "---\ntitle: x\n---\n");
/// assert_eq!(frames[1], "---\ntitle: x\n---\n# Notice\n");
/// ```
#[must_use]
pub fn hero_frames(example: &str) -> Vec<String> {
    let lines: Vec<&str> = example.split('\n').collect();
    let mut fences = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.trim() == "---")
        .map(|(index, _)| index);
    let (Some(_), Some(fm_end)) = (fences.next(), fences.next()) else {
        return vec![example.to_owned()];
    };

    let (front, body) = lines.split_at(fm_end + 1);
    let (title_end, first_para_end) = body_landmarks(body);

    let frame = |body_len: usize| {
        let taken = body.get(..body_len.min(body.len())).unwrap_or_default();
        let mut text = front.iter().chain(taken).copied().collect::<Vec<_>>().join("\n");
        text.push('\n');
        text
    };

    vec![
        frame(0),
        frame(title_end.max(1)),
        frame(first_para_end + 2),
        example.to_owned(),
    ]
}

/// Line counts covering the title and the first paragraph of `body`.
///
/// The title ends after the first non-blank line; the first paragraph ends
/// at the first blank line following any content (or the end of the body).
fn body_landmarks(body: &[&str]) -> (usize, usize) {
    let mut title_end = None;
    let mut first_para_end = None;
    for (index, line) in body.iter().enumerate() {
        if line.trim().is_empty() {
            if title_end.is_some() && first_para_end.is_none() {
                first_para_end = Some(index);
            }
        } else if title_end.is_none() {
            title_end = Some(index + 1);
        }
    }
    (
        title_end.unwrap_or(0),
        first_para_end.unwrap_or(body.len()),
    )
}

/// Shared prefix of every hero frame file.
pub const FRAME_PREFIX: &str = "hero-frame-";

/// Filename of the converted frame `index`.
#[must_use]
pub fn frame_filename(index: usize, extension: &str) -> String {
    format!("{FRAME_PREFIX}{index}.{extension}")
}
