//! Printed narration around the packets
//!
//! A [`Lesson`] writes the parts every demo program prints in the same order: a section header,
//! a key concepts list, the structure and hex dump of each packet, the outcome of sending it and
//! finally the questions and answers. Rules are as wide as an annotated hex dump line.

use std::io::Write;

use crate::errors::Error;
use crate::packet::Packet;
use crate::view;

/// Width of `=` and `-` rules.
pub const RULE_WIDTH: usize = 71;

/// A question and its answer, printed as `Q:` followed by the answer text.
#[derive(Debug, Clone, Copy)]
pub struct Faq<'a> {
    pub question: &'a str,
    pub answer: &'a str,
}

impl<'a> Faq<'a> {
    pub const fn new(question: &'a str, answer: &'a str) -> Self {
        Self { question, answer }
    }
}

pub struct Lesson<W: Write> {
    out: W,
}

impl<W: Write> Lesson<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// `title` between two `=` rules.
    pub fn section(&mut self, title: &str) -> Result<(), Error> {
        writeln!(self.out, "{}", "=".repeat(RULE_WIDTH))?;
        writeln!(self.out, "{}", title)?;
        writeln!(self.out, "{}", "=".repeat(RULE_WIDTH))?;
        Ok(())
    }

    /// `title` between two `-` rules, after an empty line.
    pub fn example(&mut self, title: &str) -> Result<(), Error> {
        writeln!(self.out)?;
        writeln!(self.out, "{}", "-".repeat(RULE_WIDTH))?;
        writeln!(self.out, "{}", title)?;
        writeln!(self.out, "{}", "-".repeat(RULE_WIDTH))?;
        Ok(())
    }

    pub fn key_concepts(&mut self, concepts: &[&str]) -> Result<(), Error> {
        writeln!(self.out)?;
        writeln!(self.out, "KEY CONCEPTS")?;
        self.bullets(concepts)
    }

    pub fn bullets(&mut self, items: &[&str]) -> Result<(), Error> {
        for item in items {
            writeln!(self.out, "  - {}", item)?;
        }
        Ok(())
    }

    pub fn line(&mut self, text: &str) -> Result<(), Error> {
        writeln!(self.out, "{}", text)?;
        Ok(())
    }

    pub fn blank(&mut self) -> Result<(), Error> {
        writeln!(self.out)?;
        Ok(())
    }

    /// Field listing, then the annotated hex dump of `packet`.
    ///
    /// A packet whose layers don't account for its bytes is an error, nothing is printed for it.
    pub fn packet(&mut self, packet: &Packet) -> Result<(), Error> {
        let view = packet.view()?;
        writeln!(self.out)?;
        writeln!(self.out, "Packet structure ({}):", packet.summary())?;
        write!(self.out, "{}", view.render_fields())?;
        writeln!(self.out)?;
        writeln!(self.out, "Hex dump ({} bytes):", packet.len())?;
        write!(self.out, "{}", view.render_hex())?;
        Ok(())
    }

    /// Plain hex dump of bytes that are not a packet, e.g. an application payload on its own.
    pub fn hexdump(&mut self, bytes: &[u8]) -> Result<(), Error> {
        writeln!(self.out, "Hex dump ({} bytes):", bytes.len())?;
        write!(self.out, "{}", view::hexdump(bytes))?;
        Ok(())
    }

    /// The questions and answers, as their own section.
    pub fn faq(&mut self, entries: &[Faq<'_>]) -> Result<(), Error> {
        writeln!(self.out)?;
        self.section("FREQUENTLY ASKED QUESTIONS")?;
        for entry in entries {
            writeln!(self.out)?;
            writeln!(self.out, "Q: {}", entry.question)?;
            writeln!(self.out, "{}", "-".repeat(RULE_WIDTH))?;
            writeln!(self.out, "{}", entry.answer.trim_end())?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::PacketBuilder;

    fn printed<F>(f: F) -> String
    where
        F: FnOnce(&mut Lesson<Vec<u8>>) -> Result<(), Error>,
    {
        let mut lesson = Lesson::new(vec![]);
        f(&mut lesson).unwrap();
        String::from_utf8(lesson.into_inner()).unwrap()
    }

    #[test]
    fn section_is_framed_by_rules() {
        let out = printed(|l| l.section("TLS AND HTTPS"));
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), RULE_WIDTH);
        assert!(lines[0].chars().all(|c| c == '='));
        assert_eq!(lines[1], "TLS AND HTTPS");
    }

    #[test]
    fn key_concepts_are_bullets() {
        let out = printed(|l| l.key_concepts(&["Protocols are bytes", "Order matters"]));
        assert_eq!(
            out,
            "\nKEY CONCEPTS\n  - Protocols are bytes\n  - Order matters\n"
        );
    }

    #[test]
    fn faq_prints_questions_and_answers() {
        let out = printed(|l| {
            l.faq(&[Faq::new(
                "Why root?",
                "Raw sockets can forge addresses.\n",
            )])
        });
        assert!(out.contains("FREQUENTLY ASKED QUESTIONS\n"));
        assert!(out.contains("Q: Why root?\n"));
        assert!(out.ends_with("Raw sockets can forge addresses.\n"));
    }

    #[test]
    fn packet_prints_structure_then_hex() {
        let packet = PacketBuilder::new()
            .stack_bytes(b"GET / HTTP/1.1\r\n")
            .build()
            .unwrap();
        let out = printed(|l| l.packet(&packet));

        let structure = out.find("###[ Raw ]###").unwrap();
        let dump = out.find("Hex dump (16 bytes):").unwrap();
        assert!(structure < dump);
        assert!(out.contains("0000  47 45 54 20"));
    }
}
