// src/cli.rs
//! Interactive terminal prompts.

use crate::pipeline::NewVideo;
use crate::validation::{validate_description, validate_source_url, WatermarkPosition, MAX_DESCRIPTION_CHARS};
use std::io::{self, BufRead, Write};

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `question` and read one line without its line ending. `None` at end of input.
    fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let answer = line.strip_suffix('\n').unwrap_or(&line);
        let answer = answer.strip_suffix('\r').unwrap_or(answer);
        Ok(Some(answer.to_string()))
    }

    /// Yes/no question; only "yes" or "y" (any case) count as yes.
    pub fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let answer = self.ask(question)?.unwrap_or_default().trim().to_lowercase();
        Ok(answer == "yes" || answer == "y")
    }

    /// Keep asking until `parse` accepts the answer.
    pub fn ask_until<T, F>(&mut self, question: &str, parse: F) -> io::Result<T>
    where
        F: Fn(&str) -> Result<T, String>,
    {
        loop {
            let answer = self.ask(question)?.ok_or_else(|| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "input closed before a valid answer")
            })?;
            match parse(&answer) {
                Ok(value) => return Ok(value),
                Err(msg) => writeln!(self.output, "❌ {}", msg)?,
            }
        }
    }

    /// Collect URL, description and watermark position for a new video.
    /// The description is kept exactly as typed.
    pub fn new_video(&mut self) -> io::Result<NewVideo> {
        let source_url = self.ask_until("Enter the TikTok video URL: ", |answer| {
            let answer = answer.trim();
            if validate_source_url(answer) {
                Ok(answer.to_string())
            } else {
                Err("That is not a TikTok video URL".to_string())
            }
        })?;

        let description = self.ask_until(
            &format!("Enter the video description (max. {} characters): ", MAX_DESCRIPTION_CHARS),
            |answer| {
                if validate_description(answer) {
                    Ok(answer.to_string())
                } else {
                    Err(format!("Description is longer than {} characters", MAX_DESCRIPTION_CHARS))
                }
            },
        )?;

        let watermark_position = self.ask_until(
            "Enter the watermark position ('top' or 'bottom'): ",
            |answer| answer.parse::<WatermarkPosition>(),
        )?;

        Ok(NewVideo {
            source_url,
            description,
            watermark_position,
        })
    }

    pub fn say(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.output, "{}", message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_confirm_accepts_only_yes() {
        assert!(prompter("yes\n").confirm("? ").unwrap());
        assert!(prompter("Y\n").confirm("? ").unwrap());
        assert!(!prompter("yeah\n").confirm("? ").unwrap());
        assert!(!prompter("").confirm("? ").unwrap());
    }

    #[test]
    fn test_new_video_reprompts_until_valid() {
        let long = "x".repeat(101);
        let input = format!(
            "https://example.com/video/123\nhttps://www.tiktok.com/@user/video/123\n{}\nGreat save\nmiddle\nBottom\n",
            long
        );
        let mut prompter = prompter(&input);

        let video = prompter.new_video().unwrap();
        assert_eq!(video.source_url, "https://www.tiktok.com/@user/video/123");
        assert_eq!(video.description, "Great save");
        assert_eq!(video.watermark_position, WatermarkPosition::Bottom);

        let transcript = String::from_utf8(prompter.output).unwrap();
        assert_eq!(transcript.matches("Enter the TikTok video URL").count(), 2);
        assert_eq!(transcript.matches("Enter the video description").count(), 2);
        assert_eq!(transcript.matches("Enter the watermark position").count(), 2);
    }

    #[test]
    fn test_new_video_keeps_description_as_typed() {
        let input = "  https://www.tiktok.com/@user/video/123 \r\n  Great save!  \r\n top \n";
        let video = prompter(input).new_video().unwrap();
        assert_eq!(video.source_url, "https://www.tiktok.com/@user/video/123");
        assert_eq!(video.description, "  Great save!  ");
        assert_eq!(video.watermark_position, WatermarkPosition::Top);
    }

    #[test]
    fn test_confirm_ignores_surrounding_whitespace() {
        assert!(prompter("  yes \r\n").confirm("? ").unwrap());
    }

    #[test]
    fn test_new_video_fails_on_closed_input() {
        let err = prompter("https://example.com/video/123\n").new_video().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
