use std::collections::HashMap;

use log::{debug, trace, warn};

use super::types::{AnnotationRecord, PreviousRevision, RevisionMeta, Signature};
use crate::error::{BlameError, Result};

/// Chunk lengths that carry the 9-line metadata block: header, metadata,
/// filename and content, plus optional `boundary` and `previous` lines.
const WITH_METADATA: [usize; 3] = [12, 13, 14];
/// Chunk lengths for a revision already seen: header and content, plus
/// optional `filename` and `previous` lines.
const WITHOUT_METADATA: [usize; 3] = [2, 3, 4];
const METADATA_LINES: usize = 9;

/// Metadata remembered for a revision after its first full chunk.
#[derive(Debug, Clone)]
struct CachedRevision {
    meta: RevisionMeta,
    filename: String,
    previous: Option<PreviousRevision>,
    boundary: bool,
}

/// Revision metadata seen so far in one porcelain stream.
///
/// Scoped to a single parse so that parses stay independent.
#[derive(Debug, Default)]
struct MetadataCache {
    revisions: HashMap<String, CachedRevision>,
}

impl MetadataCache {
    fn len(&self) -> usize {
        self.revisions.len()
    }
}

struct Header<'a> {
    revision_id: &'a str,
    origin_line: u32,
    final_line: u32,
    group_size: Option<u32>,
}

#[derive(Default)]
struct Trailer {
    boundary: bool,
    previous: Option<PreviousRevision>,
    filename: Option<String>,
}

/// Parse raw `git blame --line-porcelain` (or `--porcelain`) bytes.
pub fn parse_blame_output(raw: &[u8]) -> Result<Vec<AnnotationRecord>> {
    let input = std::str::from_utf8(raw)?;
    parse_porcelain(input)
}

/// Parse porcelain blame text into one record per line of the blamed file.
///
/// The stream is a sequence of chunks, one per line of the file:
/// ```text
/// <sha> <orig_line> <final_line> [<num_lines>]
/// author <name>                     \
/// author-mail <<email>>              |
/// author-time <epoch>                |
/// author-tz <tz>                     |  only the first time
/// committer <name>                   |  <sha> appears
/// committer-mail <<email>>           |
/// committer-time <epoch>             |
/// committer-tz <tz>                  |
/// summary <text>                    /
/// boundary                          (optional)
/// previous <sha> <filename>         (optional)
/// filename <path>
/// \t<line content>
/// ```
///
/// Records are numbered by their position in the stream, starting at 1.
pub fn parse_porcelain(input: &str) -> Result<Vec<AnnotationRecord>> {
    let mut lines: Vec<&str> = input.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }

    let mut cache = MetadataCache::default();
    let mut records = Vec::new();
    let mut chunk_start = 0;

    for (idx, line) in lines.iter().enumerate() {
        if !line.starts_with('\t') {
            continue;
        }
        let chunk = &lines[chunk_start..=idx];
        let record = parse_chunk(chunk, chunk_start + 1, records.len() + 1, &mut cache)
            .inspect_err(|e| warn!("rejecting blame output: {e}"))?;
        records.push(record);
        chunk_start = idx + 1;
    }

    if chunk_start < lines.len() {
        let err = BlameError::malformed(
            chunk_start + 1,
            format!(
                "chunk of {} lines is not terminated by a content line",
                lines.len() - chunk_start
            ),
        );
        warn!("rejecting blame output: {err}");
        return Err(err);
    }

    debug!(
        "parsed {} blame records across {} revisions",
        records.len(),
        cache.len()
    );
    Ok(records)
}

/// `chunk` ends with its tab-led content line; `at` is the 1-based input
/// line of its header.
fn parse_chunk(
    chunk: &[&str],
    at: usize,
    line: usize,
    cache: &mut MetadataCache,
) -> Result<AnnotationRecord> {
    let header = parse_header(chunk[0], at)?;
    let content = &chunk[chunk.len() - 1][1..];
    let line_text = content.strip_suffix('\r').unwrap_or(content);
    let body = &chunk[1..chunk.len() - 1];

    let (meta, trailer) = if WITH_METADATA.contains(&chunk.len()) {
        let meta = parse_metadata(&body[..METADATA_LINES], at + 1)?;
        let trailer = parse_trailer(&body[METADATA_LINES..], at + 1 + METADATA_LINES)?;
        (Some(meta), trailer)
    } else if WITHOUT_METADATA.contains(&chunk.len()) {
        (None, parse_trailer(body, at + 1)?)
    } else {
        return Err(BlameError::malformed(
            at,
            format!("unrecognized chunk length {}", chunk.len()),
        ));
    };

    let cached = match meta {
        Some(meta) => {
            let filename = trailer
                .filename
                .ok_or_else(|| BlameError::malformed(at, "metadata chunk without filename"))?;
            let entry = CachedRevision {
                meta,
                filename,
                previous: trailer.previous,
                boundary: trailer.boundary,
            };
            cache
                .revisions
                .insert(header.revision_id.to_string(), entry.clone());
            entry
        }
        None => {
            if trailer.boundary {
                return Err(BlameError::malformed(at, "boundary without metadata"));
            }
            let entry = cache.revisions.get_mut(header.revision_id).ok_or_else(|| {
                BlameError::malformed(
                    at,
                    format!("no metadata seen yet for revision {}", header.revision_id),
                )
            })?;
            if let Some(filename) = trailer.filename {
                entry.filename = filename;
                entry.previous = trailer.previous;
            }
            entry.clone()
        }
    };

    trace!("line {line} -> {}", header.revision_id);

    Ok(AnnotationRecord {
        line,
        revision_id: header.revision_id.to_string(),
        origin_line: header.origin_line,
        final_line: header.final_line,
        group_size: header.group_size,
        meta: cached.meta,
        previous: cached.previous,
        boundary: cached.boundary,
        filename: cached.filename,
        line_text: line_text.to_string(),
    })
}

/// Parse `<sha> <orig_line> <final_line> [<num_lines>]`.
fn parse_header(line: &str, at: usize) -> Result<Header<'_>> {
    let parts: Vec<&str> = line.split(' ').collect();
    if parts.len() != 3 && parts.len() != 4 {
        return Err(BlameError::malformed(
            at,
            format!("expected chunk header, got {line:?}"),
        ));
    }

    let revision_id = parts[0];
    if revision_id.is_empty() || !revision_id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(BlameError::malformed(
            at,
            format!("invalid revision id {revision_id:?}"),
        ));
    }

    let number = |s: &str| {
        s.parse::<u32>()
            .map_err(|_| BlameError::malformed(at, format!("invalid line number {s:?}")))
    };

    Ok(Header {
        revision_id,
        origin_line: number(parts[1])?,
        final_line: number(parts[2])?,
        group_size: parts.get(3).copied().map(number).transpose()?,
    })
}

/// Strip `key` from a `key value` line. An empty value may be printed
/// without the separating space.
fn field<'a>(line: &'a str, key: &str, at: usize) -> Result<&'a str> {
    let rest = line
        .strip_prefix(key)
        .ok_or_else(|| BlameError::malformed(at, format!("expected {key:?}, got {line:?}")))?;
    if rest.is_empty() {
        return Ok(rest);
    }
    rest.strip_prefix(' ')
        .ok_or_else(|| BlameError::malformed(at, format!("expected {key:?}, got {line:?}")))
}

fn parse_metadata(lines: &[&str], at: usize) -> Result<RevisionMeta> {
    let signature = |offset: usize, role: &str| -> Result<Signature> {
        let at = at + offset;
        let name = field(lines[offset], role, at)?;
        let mail = field(lines[offset + 1], &format!("{role}-mail"), at + 1)?;
        let time = field(lines[offset + 2], &format!("{role}-time"), at + 2)?;
        let tz = field(lines[offset + 3], &format!("{role}-tz"), at + 3)?;
        let timestamp = time
            .parse::<i64>()
            .map_err(|_| BlameError::malformed(at + 2, format!("invalid {role} time {time:?}")))?;
        Ok(Signature {
            name: name.to_string(),
            email: mail
                .strip_prefix('<')
                .and_then(|m| m.strip_suffix('>'))
                .unwrap_or(mail)
                .to_string(),
            timestamp,
            timezone: tz.to_string(),
        })
    };

    Ok(RevisionMeta {
        author: signature(0, "author")?,
        committer: signature(4, "committer")?,
        summary: field(lines[8], "summary", at + 8)?.to_string(),
    })
}

/// Parse the optional `boundary`, `previous` and `filename` lines, which git
/// always emits in that order.
fn parse_trailer(lines: &[&str], at: usize) -> Result<Trailer> {
    let mut trailer = Trailer::default();
    let mut rest = lines;

    if rest.first() == Some(&"boundary") {
        trailer.boundary = true;
        rest = &rest[1..];
    }
    if let Some(value) = rest.first().and_then(|l| l.strip_prefix("previous ")) {
        let line = at + lines.len() - rest.len();
        let (revision_id, filename) = value.split_once(' ').ok_or_else(|| {
            BlameError::malformed(line, format!("invalid previous line {value:?}"))
        })?;
        trailer.previous = Some(PreviousRevision {
            revision_id: revision_id.to_string(),
            filename: unquote_path(filename, line)?,
        });
        rest = &rest[1..];
    }
    if let Some(value) = rest.first().and_then(|l| l.strip_prefix("filename ")) {
        trailer.filename = Some(unquote_path(value, at + lines.len() - rest.len())?);
        rest = &rest[1..];
    }

    if let Some(unexpected) = rest.first() {
        return Err(BlameError::malformed(
            at + lines.len() - rest.len(),
            format!("unexpected line {unexpected:?}"),
        ));
    }
    if trailer.previous.is_some() && trailer.filename.is_none() {
        return Err(BlameError::malformed(at, "previous without filename"));
    }
    Ok(trailer)
}

/// Undo git's C-style path quoting (`core.quotePath`). Paths with control
/// characters, quotes, backslashes or non-ASCII bytes arrive as
/// `"\303\274 b.txt"`; anything not starting with `"` is taken verbatim.
fn unquote_path(value: &str, at: usize) -> Result<String> {
    let Some(inner) = value.strip_prefix('"') else {
        return Ok(value.to_string());
    };
    let bad = |reason: &str| BlameError::malformed(at, format!("{reason} in path {value:?}"));
    let inner = inner
        .strip_suffix('"')
        .ok_or_else(|| bad("missing closing quote"))?;

    let mut bytes = Vec::with_capacity(inner.len());
    let mut iter = inner.bytes();
    while let Some(b) = iter.next() {
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        let decoded = match iter.next().ok_or_else(|| bad("dangling escape"))? {
            b'a' => 0x07,
            b'b' => 0x08,
            b't' => b'\t',
            b'n' => b'\n',
            b'v' => 0x0b,
            b'f' => 0x0c,
            b'r' => b'\r',
            b'"' => b'"',
            b'\\' => b'\\',
            hi @ b'0'..=b'3' => {
                let mut octal = hi - b'0';
                for _ in 0..2 {
                    match iter.next() {
                        Some(d @ b'0'..=b'7') => octal = octal * 8 + (d - b'0'),
                        _ => return Err(bad("short octal escape")),
                    }
                }
                octal
            }
            _ => return Err(bad("unknown escape")),
        };
        bytes.push(decoded);
    }
    String::from_utf8(bytes).map_err(|_| bad("non-UTF-8 bytes"))
}
