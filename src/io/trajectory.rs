//! Plain-text trajectory dumps.
//!
//! A frame is the particle count, the box edge length, then one line per
//! particle with a label, the position and the velocity. Frames are simply
//! concatenated.

use nalgebra::Vector3;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::state::ParticleState;

/// Label written in front of every particle line.
pub const DEFAULT_LABEL: &str = "Ne";

/// Whether a dump starts a new file or extends an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Create,
    Append,
}

/// Sink for trajectory frames.
pub trait TrajectoryWriter {
    fn write_frame(&mut self, state: &ParticleState, mode: OpenMode) -> io::Result<()>;
}

/// Trajectory file on disk. The file is opened for each frame.
#[derive(Debug, Clone)]
pub struct DumpFile {
    path: PathBuf,
    label: String,
}

impl DumpFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        DumpFile {
            path: path.as_ref().to_path_buf(),
            label: DEFAULT_LABEL.to_string(),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }
}

impl TrajectoryWriter for DumpFile {
    fn write_frame(&mut self, state: &ParticleState, mode: OpenMode) -> io::Result<()> {
        let file = match mode {
            OpenMode::Create => File::create(&self.path)?,
            OpenMode::Append => OpenOptions::new().create(true).append(true).open(&self.path)?,
        };
        let mut writer = BufWriter::new(file);
        write_frame(&mut writer, state, &self.label)?;
        writer.flush()
    }
}

/// Write one frame in the dump layout.
pub fn write_frame<W: Write>(writer: &mut W, state: &ParticleState, label: &str) -> io::Result<()> {
    writeln!(writer, "{}", state.len())?;
    writeln!(writer, "{:10.5}", state.box_length())?;
    for (x, v) in state.positions().iter().zip(state.velocities()) {
        writeln!(
            writer,
            "{} {:15.10} {:15.10} {:15.10} {:>15} {:>15} {:>15}",
            label,
            x.x,
            x.y,
            x.z,
            c_exponent(v.x, 8),
            c_exponent(v.y, 8),
            c_exponent(v.z, 8),
        )?;
    }
    Ok(())
}

/// Scientific notation with a signed, two-digit exponent (`1.50000000e-03`).
pub fn c_exponent(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let formatted = format!("{:.*e}", precision, value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let exp: i32 = exponent.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => formatted,
    }
}

/// A frame read back from a dump file.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub box_length: f64,
    pub labels: Vec<String>,
    pub positions: Vec<Vector3<f64>>,
    pub velocities: Vec<Vector3<f64>>,
}

fn invalid(line_no: usize, msg: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("line {}: {}", line_no, msg))
}

fn parse_frame<I>(lines: &mut I, count_line: (usize, String)) -> io::Result<Frame>
where
    I: Iterator<Item = (usize, io::Result<String>)>,
{
    let (count_no, count_text) = count_line;
    let n: usize = count_text
        .trim()
        .parse()
        .map_err(|e| invalid(count_no, format!("bad particle count: {}", e)))?;

    let (box_no, box_text) = lines
        .next()
        .ok_or_else(|| invalid(count_no + 1, "missing box length"))?;
    let box_text = box_text?;
    let box_length: f64 = box_text
        .trim()
        .parse()
        .map_err(|e| invalid(box_no, format!("bad box length: {}", e)))?;

    let mut frame = Frame {
        box_length,
        labels: Vec::with_capacity(n),
        positions: Vec::with_capacity(n),
        velocities: Vec::with_capacity(n),
    };

    for _ in 0..n {
        let (no, text) = lines.next().ok_or_else(|| invalid(box_no + 1, "frame is truncated"))?;
        let text = text?;
        let mut fields = text.split_whitespace();
        let label = fields.next().ok_or_else(|| invalid(no, "empty particle line"))?;
        let values = fields
            .map(|f| f.parse::<f64>().map_err(|e| invalid(no, format!("bad number '{}': {}", f, e))))
            .collect::<io::Result<Vec<f64>>>()?;
        if values.len() != 6 {
            return Err(invalid(no, format!("expected 6 values, found {}", values.len())));
        }
        frame.labels.push(label.to_string());
        frame.positions.push(Vector3::new(values[0], values[1], values[2]));
        frame.velocities.push(Vector3::new(values[3], values[4], values[5]));
    }

    Ok(frame)
}

/// Read every frame from a dump.
pub fn read_frames<R: BufRead>(reader: R) -> io::Result<Vec<Frame>> {
    let mut lines = reader.lines().enumerate().map(|(i, l)| (i + 1, l));
    let mut frames = Vec::new();
    while let Some((no, text)) = lines.next() {
        let text = text?;
        if text.trim().is_empty() {
            continue;
        }
        frames.push(parse_frame(&mut lines, (no, text))?);
    }
    Ok(frames)
}

/// Last frame of a dump file, used to restart a run.
pub fn read_last_frame<P: AsRef<Path>>(path: P) -> io::Result<Frame> {
    let file = File::open(path.as_ref())?;
    read_frames(BufReader::new(file))?
        .pop()
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "trajectory contains no frames"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_state() -> ParticleState {
        ParticleState::new(
            vec![Vector3::new(0.5, -1.25, 2.0), Vector3::new(-3.0, 0.0, 1e-4)],
            vec![Vector3::new(1.5e-3, -2.0, 0.0), Vector3::new(123.456, 0.0, -7.5e-12)],
            10.0,
        )
    }

    #[test]
    fn test_c_exponent() {
        assert_eq!(c_exponent(1.5e-3, 8), "1.50000000e-03");
        assert_eq!(c_exponent(-2.0, 8), "-2.00000000e+00");
        assert_eq!(c_exponent(0.0, 8), "0.00000000e+00");
        assert_eq!(c_exponent(6.02e123, 3), "6.020e+123");
        assert_eq!(c_exponent(f64::NAN, 8), "nan");
        assert_eq!(c_exponent(f64::NEG_INFINITY, 8), "-inf");
    }

    #[test]
    fn test_frame_layout() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &sample_state(), DEFAULT_LABEL).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "2");
        assert_eq!(lines[1], "  10.00000");
        assert_eq!(
            lines[2],
            "Ne    0.5000000000   -1.2500000000    2.0000000000  1.50000000e-03 -2.00000000e+00  0.00000000e+00"
        );
        assert!(lines[3].starts_with("Ne   -3.0000000000 "));
    }

    #[test]
    fn test_dump_file_create_then_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traj.xyz");
        let mut dump = DumpFile::new(&path);
        let state = sample_state();

        dump.write_frame(&state, OpenMode::Create).unwrap();
        dump.write_frame(&state, OpenMode::Append).unwrap();
        dump.write_frame(&state, OpenMode::Append).unwrap();
        let frames = read_frames(BufReader::new(File::open(&path).unwrap())).unwrap();
        assert_eq!(frames.len(), 3);

        // Create truncates
        dump.write_frame(&state, OpenMode::Create).unwrap();
        let frames = read_frames(BufReader::new(File::open(&path).unwrap())).unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_read_last_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traj.xyz");
        let mut dump = DumpFile::new(&path).with_label("Ar");

        let mut state = sample_state();
        dump.write_frame(&state, OpenMode::Create).unwrap();
        state.positions_mut()[0].x = 4.0;
        state.velocities_mut()[1].y = -0.25;
        dump.write_frame(&state, OpenMode::Append).unwrap();

        let frame = read_last_frame(&path).unwrap();
        assert_eq!(frame.labels, vec!["Ar", "Ar"]);
        assert_relative_eq!(frame.box_length, 10.0);
        assert_relative_eq!(frame.positions[0].x, 4.0, epsilon = 1e-10);
        assert_relative_eq!(frame.positions[1].z, 1e-4, epsilon = 1e-10);
        assert_relative_eq!(frame.velocities[1].x, 123.456, max_relative = 1e-8);
        assert_relative_eq!(frame.velocities[1].y, -0.25, max_relative = 1e-8);
    }

    #[test]
    fn test_truncated_frame_is_an_error() {
        let text = "3\n5.0\nNe 0 0 0 0 0 0\n";
        let err = read_frames(text.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_empty_file_has_no_last_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xyz");
        File::create(&path).unwrap();
        assert_eq!(read_last_frame(&path).unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
    }
}
