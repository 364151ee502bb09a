//! Frames from the external detector and board mapper
//!
//! The mapper publishes one JSON object per processed camera frame:
//!
//! ```json
//! {"grid": [["black_rook", null, ...], ...], "hand": false,
//!  "corners": [[12.0, 8.5], [630.2, 10.1], [628.7, 470.0], [14.3, 468.2]]}
//! ```
//!
//! `grid` is 8 rows of 8 cells, row 0 being the row farthest from the
//! camera, each cell a piece label (`white_pawn` … `black_king`) or `null`.
//! `corners` is present when the corner detector found all four board
//! corners in that frame.

use crate::error::{VisionError, VisionResult};
use async_trait::async_trait;
use board_reconciler::{Grid, Piece};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::debug;

/// Calibrated board corners in image coordinates
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Corners(pub [[f32; 2]; 4]);

/// One decoded observation
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub grid: Grid,
    pub hand_present: bool,
    pub corners: Option<Corners>,
}

#[derive(Deserialize)]
struct FrameRecord {
    grid: Vec<Vec<Option<String>>>,
    #[serde(default)]
    hand: bool,
    #[serde(default)]
    corners: Option<Corners>,
}

impl Frame {
    /// Decode one frame line
    pub fn decode(line: &str) -> VisionResult<Frame> {
        let record: FrameRecord =
            serde_json::from_str(line).map_err(|source| VisionError::Decode { source })?;
        if record.grid.len() != 8 {
            return Err(VisionError::Grid(format!("{} rows", record.grid.len())));
        }

        let mut grid: Grid = [[None; 8]; 8];
        for (row, cells) in record.grid.iter().enumerate() {
            if cells.len() != 8 {
                return Err(VisionError::Grid(format!("row {row} has {} cells", cells.len())));
            }
            for (col, cell) in cells.iter().enumerate() {
                grid[row][col] = match cell.as_deref() {
                    None | Some("") => None,
                    Some(label) => Some(
                        Piece::from_label(label)
                            .ok_or_else(|| VisionError::Grid(format!("unknown label '{label}'")))?,
                    ),
                };
            }
        }

        Ok(Frame {
            grid,
            hand_present: record.hand,
            corners: record.corners,
        })
    }
}

/// Source of frames
#[async_trait]
pub trait VisionSource: Send {
    /// Wait for the next frame.
    ///
    /// Must be cancel-safe: the lifecycle races it against control messages
    /// and deadlines.
    async fn next_frame(&mut self) -> VisionResult<Frame>;
}

/// Frames read as JSON lines from a byte stream
pub struct StreamVision<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin + Send> StreamVision<R> {
    pub fn new(reader: R) -> Self {
        StreamVision {
            lines: reader.lines(),
        }
    }
}

/// Open the configured frame stream (`-` for stdin)
pub async fn open_stream(
    frames: &str,
) -> VisionResult<StreamVision<Box<dyn AsyncBufRead + Unpin + Send>>> {
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = if frames == "-" {
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        Box::new(BufReader::new(tokio::fs::File::open(Path::new(frames)).await?))
    };
    Ok(StreamVision::new(reader))
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> VisionSource for StreamVision<R> {
    async fn next_frame(&mut self) -> VisionResult<Frame> {
        loop {
            // next_line keeps a partly read line buffered across cancellation
            let Some(line) = self.lines.next_line().await? else {
                return Err(VisionError::Closed);
            };
            if line.trim().is_empty() {
                continue;
            }
            match Frame::decode(&line) {
                Ok(frame) => return Ok(frame),
                Err(VisionError::Decode { source }) => {
                    debug!("[VISION] Skipping undecodable frame: {source}");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use board_reconciler::{Board, Orientation};
    use std::time::Duration;

    fn start_frame_json() -> String {
        let grid = Board::standard().to_grid(Orientation::WhiteBottom);
        let rows: Vec<Vec<Option<String>>> = grid
            .iter()
            .map(|row| row.iter().map(|cell| cell.map(|p| p.label())).collect())
            .collect();
        serde_json::json!({"grid": rows, "hand": false}).to_string()
    }

    #[test]
    fn test_decode_frame() {
        let frame = Frame::decode(&start_frame_json()).unwrap();
        assert!(!frame.hand_present);
        assert_eq!(frame.corners, None);
        assert_eq!(
            Board::from_grid(&frame.grid, Orientation::WhiteBottom),
            Board::standard()
        );
    }

    #[test]
    fn test_decode_rejects_bad_grids() {
        let short = r#"{"grid": [[null]]}"#;
        assert!(matches!(Frame::decode(short), Err(VisionError::Grid(_))));

        let mut rows = vec![vec![None::<String>; 8]; 8];
        rows[0][0] = Some("purple_dragon".to_string());
        let unknown = serde_json::json!({ "grid": rows }).to_string();
        assert!(matches!(Frame::decode(&unknown), Err(VisionError::Grid(_))));
    }

    #[tokio::test]
    async fn test_stream_skips_noise_and_reports_end() {
        let corners = r#"{"grid": [[null,null,null,null,null,null,null,null],[null,null,null,null,null,null,null,null],[null,null,null,null,null,null,null,null],[null,null,null,null,null,null,null,null],[null,null,null,null,null,null,null,null],[null,null,null,null,null,null,null,null],[null,null,null,null,null,null,null,null],[null,null,null,null,null,null,null,null]], "hand": true, "corners": [[0,0],[1,0],[1,1],[0,1]]}"#;
        let input = format!("\n{{garbage\n{}\n{corners}\n", start_frame_json());
        let mut vision = StreamVision::new(input.as_bytes());

        let first = vision.next_frame().await.unwrap();
        assert_eq!(
            Board::from_grid(&first.grid, Orientation::WhiteBottom),
            Board::standard()
        );
        let second = vision.next_frame().await.unwrap();
        assert!(second.hand_present);
        assert_eq!(second.corners, Some(Corners([[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]])));
        assert!(matches!(vision.next_frame().await, Err(VisionError::Closed)));
    }

    #[tokio::test]
    async fn test_cancelled_read_keeps_partial_frame() {
        //! A frame split across a cancelled wait is still delivered whole

        use tokio::io::AsyncWriteExt;

        let line = start_frame_json();
        let (head, tail) = line.split_at(line.len() / 2);
        let (mut writer, reader) = tokio::io::duplex(4096);
        let mut vision = StreamVision::new(BufReader::new(reader));

        writer.write_all(head.as_bytes()).await.unwrap();
        let waited = tokio::time::timeout(Duration::from_millis(50), vision.next_frame()).await;
        assert!(waited.is_err(), "half a line must not produce a frame");

        writer.write_all(tail.as_bytes()).await.unwrap();
        writer.write_all(b"\n").await.unwrap();
        drop(writer);

        let frame = vision.next_frame().await.unwrap();
        assert_eq!(
            Board::from_grid(&frame.grid, Orientation::WhiteBottom),
            Board::standard()
        );
        assert!(matches!(vision.next_frame().await, Err(VisionError::Closed)));
    }
}
