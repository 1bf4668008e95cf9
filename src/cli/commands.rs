// CLI command implementations

use super::OutputFormatter;
use anyhow::{bail, Context, Result};
use mediatree::mpeg::format_time;
use mediatree::tree::{Format, Tree};
use mediatree::{detect_format, Asf, AudioFile, FileFormat, Id3v2, Iso14496, MpegAudio, Options};
use serde_json::{json, Value};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Read metadata from files; a failing file is reported and skipped
pub fn command_read(
    files: &[impl AsRef<Path>],
    output: Option<&Path>,
    covers: Option<&Path>,
    options: &Options,
    formatter: &OutputFormatter,
) -> Result<()> {
    let mut writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stdout()),
    };

    let mut failures = 0;
    for path in files {
        let path = path.as_ref();
        match read_one(path, covers, options) {
            Ok(value) => formatter.output(&value, &mut writer)?,
            Err(e) => {
                failures += 1;
                formatter.print_error(&format!("{}: {:#}", path.display(), e));
            }
        }
    }
    writer.flush()?;
    if failures == files.len() {
        bail!("no file could be read");
    }
    Ok(())
}

fn read_one(path: &Path, covers: Option<&Path>, options: &Options) -> Result<Value> {
    let audio = AudioFile::open(path, options.clone()).with_context(|| format!("cannot open {}", path.display()))?;
    let metadata = audio.metadata().context("cannot decode metadata")?;

    if let (Some(dir), Some(cover)) = (covers, &metadata.cover) {
        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let target = dir.join(format!("{}.{}", stem, cover.extension()));
        cover.save(&target).with_context(|| format!("cannot save cover to {}", target.display()))?;
    }

    let mut value = serde_json::to_value(&metadata)?;
    if let Value::Object(obj) = &mut value {
        obj.insert("file".into(), json!(path.display().to_string()));
        if let Some(duration) = metadata.duration {
            obj.insert("length".into(), json!(format_time(duration)));
        }
    }
    Ok(value)
}

pub fn command_detect(files: &[impl AsRef<Path>], formatter: &OutputFormatter) -> Result<()> {
    let mut stdout = io::stdout();
    for path in files {
        let path = path.as_ref();
        match detect_format(path) {
            Ok(format) => formatter.output(
                &json!({ "file": path.display().to_string(), "format": format.to_string() }),
                &mut stdout,
            )?,
            Err(e) => formatter.print_error(&format!("{}: {}", path.display(), e)),
        }
    }
    Ok(())
}

/// One row of a tree dump
fn dump_tree<F: Format>(tree: &Tree<F>) -> Vec<Value> {
    tree.walk()
        .into_iter()
        .filter_map(|(depth, id)| {
            let node = tree.node(id)?;
            Some(json!({
                "depth": depth,
                "id": node.identifier().to_string(),
                "offset": node.offset(),
                "size": node.size(),
                "children": node.children().len(),
            }))
        })
        .collect()
}

pub fn command_tree(path: &Path, options: &Options, formatter: &OutputFormatter) -> Result<()> {
    let format = detect_format(path).with_context(|| format!("cannot open {}", path.display()))?;
    let nodes = match format {
        FileFormat::Asf => {
            let mut asf = Asf::open(path, options.clone())?;
            asf.read_to_end().context("cannot decode ASF objects")?;
            dump_tree(asf.tree())
        }
        FileFormat::Id3v2 => {
            let tag = Id3v2::read(path, options.clone()).context("cannot decode ID3v2 tag")?;
            dump_tree(tag.tree())
        }
        FileFormat::Mp4 => {
            let file = Iso14496::read(path, options.clone()).context("cannot decode boxes")?;
            dump_tree(file.tree())
        }
        FileFormat::Mpeg | FileFormat::Unknown => bail!("{} has no object tree ({})", path.display(), format),
    };
    formatter.print_info(&format!("{} nodes in {} tree", nodes.len(), format));
    formatter.output(&Value::Array(nodes), &mut io::stdout())
}

pub fn command_info(path: &Path, options: &Options, formatter: &OutputFormatter) -> Result<()> {
    let mut audio =
        MpegAudio::open(path, options.clone()).with_context(|| format!("cannot read MPEG audio from {}", path.display()))?;
    let estimate = audio.estimate();
    let first = *audio.first_frame();
    let mut value = json!({
        "file": path.display().to_string(),
        "version": first.version.to_string(),
        "layer": first.layer.to_string(),
        "sample_rate": first.sample_rate,
        "channel_mode": first.channel_mode,
        "audio_range": audio.audio_range(),
        "xing": audio.xing(),
        "lame": audio.lame(),
        "vbri": audio.vbri(),
        "estimate": estimate,
    });

    let exact = audio.exact_estimate().context("cannot scan every frame")?;
    if let Value::Object(obj) = &mut value {
        obj.insert("exact".into(), serde_json::to_value(exact)?);
        obj.insert("frames".into(), json!(audio.frames_read()));
        obj.insert("length".into(), json!(format_time(exact.duration_secs)));
    }
    formatter.print_info(&format!(
        "estimate {:.1} kbit/s from {:?}, exact {:.1} kbit/s",
        estimate.bitrate_kbps, estimate.source, exact.bitrate_kbps
    ));
    formatter.output(&value, &mut io::stdout())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;

    fn mpeg_file(frames: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for _ in 0..frames {
            let mut frame = 0xFFFB_9064u32.to_be_bytes().to_vec();
            frame.resize(417, 0);
            file.write_all(&frame).unwrap();
        }
        file
    }

    #[test]
    fn test_read_to_file() {
        let input = mpeg_file(3);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.json");
        let formatter = OutputFormatter::new(OutputFormat::Json, true);
        command_read(&[input.path()], Some(output.as_path()), None, &Options::default(), &formatter).unwrap();

        let value: Value = serde_json::from_str(std::fs::read_to_string(&output).unwrap().trim()).unwrap();
        assert_eq!(value["file_type"], "MPEG");
        assert_eq!(value["bitrate"], 128.0);
        assert_eq!(value["length"], "0:00");
    }

    #[test]
    fn test_read_fails_when_nothing_readable() {
        let formatter = OutputFormatter::new(OutputFormat::Json, true);
        let missing = [Path::new("/nonexistent/a.mp3")];
        assert!(command_read(&missing, None, None, &Options::default(), &formatter).is_err());
    }

    #[test]
    fn test_tree_needs_a_container() {
        let input = mpeg_file(1);
        let formatter = OutputFormatter::new(OutputFormat::Json, true);
        assert!(command_tree(input.path(), &Options::default(), &formatter).is_err());
    }

    #[test]
    fn test_dump_tree_rows() {
        let mut data = b"ID3\x04\x00\x00\x00\x00\x00\x0f".to_vec();
        data.extend_from_slice(b"TIT2\x00\x00\x00\x05\x00\x00\x03Song");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();

        let tag = Id3v2::read(file.path(), Options::default()).unwrap();
        let rows = dump_tree(tag.tree());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["depth"], 0);
        assert_eq!(rows[1]["id"], "TIT2");
        assert_eq!(rows[1]["size"], 15);
    }
}
