//! Streaming reader for association files.
//!
//! The reader walks the XML once and pushes every declaration it recognizes
//! straight to an [`AssociationBuilder`]; nothing is buffered here. Parsing is
//! lenient: unknown elements, elements out of context and recognized elements
//! missing a required attribute are skipped, so the format can grow without
//! breaking older readers. Only tokenizer failures, builder errors and stream
//! failures stop a read.

use std::io::{BufReader, Read};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Reader;
use crate::builder::{AssociationBuilder, BuildResult};
use crate::error::{AssocError, Result};

pub const ELEMENT_ASSOCIATION: &str = "association";
pub const ELEMENT_MASK: &str = "mask";
pub const ELEMENT_IS_HIDDEN: &str = "is-hidden";
pub const ELEMENT_IS_SYMLINK: &str = "is-symlink";
pub const ELEMENT_IS_READABLE: &str = "is-readable";
pub const ELEMENT_IS_WRITABLE: &str = "is-writable";
pub const ELEMENT_IS_EXECUTABLE: &str = "is-executable";

pub const ATTRIBUTE_COMMAND: &str = "command";
pub const ATTRIBUTE_VALUE: &str = "value";
pub const ATTRIBUTE_CASE_SENSITIVE: &str = "case-sensitive";

pub const VALUE_TRUE: &str = "true";

/// Reads association declarations from `input` and reports them to `builder`.
///
/// `start_building` is called before the first byte is read and, once it has
/// succeeded, `end_building` is called exactly once on every return path, error
/// or not. A panic inside the builder unwinds past it. The first error wins: if
/// the read failed, a failing `end_building` is only logged. Associations
/// reported before a failure stay with the builder.
///
/// A document that ends with elements still open is a fatal break.
///
/// The stream is only read, never closed; pass `&mut file` to keep it.
pub fn read<R, B>(input: R, builder: &mut B) -> Result<()>
where
    R: Read,
    B: AssociationBuilder + ?Sized,
{
    builder.start_building()?;
    let outcome = AssociationReader::new(builder).consume(input);
    let finished = builder.end_building().map_err(AssocError::from);

    match (outcome, finished) {
        (Err(e), Err(cleanup)) => {
            tracing::warn!("end_building failed after an earlier error: {}", cleanup);
            Err(e)
        }
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Ok(()), Ok(())) => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Outside,
    InsideAssociation,
}

/// The boolean attributes an association can constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    Hidden,
    Symlink,
    Readable,
    Writable,
    Executable,
}

impl Flag {
    fn from_element(name: &[u8]) -> Option<Self> {
        [
            (ELEMENT_IS_HIDDEN, Self::Hidden),
            (ELEMENT_IS_SYMLINK, Self::Symlink),
            (ELEMENT_IS_READABLE, Self::Readable),
            (ELEMENT_IS_WRITABLE, Self::Writable),
            (ELEMENT_IS_EXECUTABLE, Self::Executable),
        ]
        .into_iter()
        .find(|(element, _)| element.as_bytes() == name)
        .map(|(_, flag)| flag)
    }

    fn apply<B: AssociationBuilder + ?Sized>(self, builder: &mut B, value: bool) -> BuildResult {
        match self {
            Self::Hidden => builder.set_is_hidden(value),
            Self::Symlink => builder.set_is_symlink(value),
            Self::Readable => builder.set_is_readable(value),
            Self::Writable => builder.set_is_writable(value),
            Self::Executable => builder.set_is_executable(value),
        }
    }
}

/// Single-use state machine driven by the tokenizer's element events.
struct AssociationReader<'b, B: AssociationBuilder + ?Sized> {
    builder: &'b mut B,
    state: State,
    /// Byte offset of the event being handled, for error reports.
    position: u64,
    /// Elements opened and not yet closed. Stray closes never take it below zero.
    depth: usize,
}

impl<'b, B: AssociationBuilder + ?Sized> AssociationReader<'b, B> {
    fn new(builder: &'b mut B) -> Self {
        Self { builder, state: State::Outside, position: 0, depth: 0 }
    }

    fn consume<R: Read>(mut self, input: R) -> Result<()> {
        let mut xml = Reader::from_reader(BufReader::new(input));
        let config = xml.config_mut();
        // `<mask/>` arrives as start + end, and close tags are never matched
        // against their opener: stray closes are just more events.
        config.expand_empty_elements = true;
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        let mut buf = Vec::new();
        loop {
            self.position = xml.buffer_position();
            match xml.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    self.depth += 1;
                    self.start_element(&e)?
                }
                Ok(Event::End(e)) => {
                    self.depth = self.depth.saturating_sub(1);
                    self.end_element(&e)?
                }
                Ok(Event::Eof) if self.depth > 0 => {
                    return Err(AssocError::UnexpectedEof {
                        position: self.position,
                        open: self.depth,
                    });
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(AssocError::from_xml(e, xml.error_position())),
            }
            buf.clear();
        }
        Ok(())
    }

    fn start_element(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let name = e.name();
        let name = name.as_ref();

        if self.state == State::Outside {
            if name != ELEMENT_ASSOCIATION.as_bytes() {
                tracing::trace!(
                    "ignoring <{}> outside of an association",
                    String::from_utf8_lossy(name)
                );
                return Ok(());
            }
            let Some(command) = self.attribute(e, ATTRIBUTE_COMMAND)? else {
                tracing::trace!("skipping <association> without a command");
                return Ok(());
            };
            self.state = State::InsideAssociation;
            tracing::debug!(command = %command, "association opened");
            self.builder.start_association(&command)?;
            return Ok(());
        }

        if name == ELEMENT_MASK.as_bytes() {
            let Some(mask) = self.attribute(e, ATTRIBUTE_VALUE)? else {
                tracing::trace!("skipping <mask> without a value");
                return Ok(());
            };
            let case_sensitive = match self.attribute(e, ATTRIBUTE_CASE_SENSITIVE)? {
                Some(v) => v == VALUE_TRUE,
                None => true,
            };
            self.builder.set_mask(&mask, case_sensitive)?;
        } else if let Some(flag) = Flag::from_element(name) {
            let Some(value) = self.attribute(e, ATTRIBUTE_VALUE)? else {
                tracing::trace!("skipping {:?} flag without a value", flag);
                return Ok(());
            };
            flag.apply(&mut *self.builder, value == VALUE_TRUE)?;
        } else if name == ELEMENT_ASSOCIATION.as_bytes() {
            tracing::trace!("ignoring <association> nested in an open one");
        } else {
            tracing::trace!(
                "ignoring unknown <{}> in association",
                String::from_utf8_lossy(name)
            );
        }
        Ok(())
    }

    fn end_element(&mut self, e: &BytesEnd<'_>) -> Result<()> {
        let closes_association = e.name().as_ref() == ELEMENT_ASSOCIATION.as_bytes();
        if self.state == State::InsideAssociation && closes_association {
            self.builder.end_association()?;
            self.state = State::Outside;
            tracing::debug!("association closed");
        }
        Ok(())
    }

    /// Looks up and unescapes an attribute; `None` when it is absent.
    ///
    /// Every attribute of the element is scanned, so a malformed or repeated
    /// attribute fails the read even when it is not the one asked for.
    fn attribute(&self, e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
        let mut found = None;
        for attr in e.attributes() {
            let attr = attr.map_err(|err| AssocError::from_xml(err.into(), self.position))?;
            if found.is_none() && attr.key.as_ref() == name.as_bytes() {
                let value = attr
                    .unescape_value()
                    .map_err(|err| AssocError::from_xml(err, self.position))?;
                found = Some(value.into_owned());
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use super::*;
    use crate::builder::{BuildEvent, EventLog};
    use crate::error::BuildError;

    fn trace(xml: &str) -> (Result<()>, Vec<BuildEvent>) {
        let mut log = EventLog::default();
        let result = read(xml.as_bytes(), &mut log);
        (result, log.events)
    }

    fn events(xml: &str) -> Vec<BuildEvent> {
        let (result, events) = trace(xml);
        result.unwrap();
        events
    }

    fn start(command: &str) -> BuildEvent {
        BuildEvent::StartAssociation { command: command.to_string() }
    }

    fn mask(mask: &str, case_sensitive: bool) -> BuildEvent {
        BuildEvent::SetMask { mask: mask.to_string(), case_sensitive }
    }

    /// Wraps an [`EventLog`] and fails on the first call whose rendering starts with `fail_on`.
    struct Picky {
        log: EventLog,
        fail_on: &'static str,
        end_fails: bool,
    }

    impl Picky {
        fn new(fail_on: &'static str) -> Self {
            Self { log: EventLog::default(), fail_on, end_fails: false }
        }

        fn check(&self) -> BuildResult {
            match self.log.events.last() {
                Some(e) if e.to_string().starts_with(self.fail_on) => {
                    Err(BuildError::InvalidMask {
                        mask: e.to_string(),
                        reason: "refused".to_string(),
                    })
                }
                _ => Ok(()),
            }
        }
    }

    impl AssociationBuilder for Picky {
        fn start_building(&mut self) -> BuildResult {
            self.log.start_building()?;
            self.check()
        }
        fn start_association(&mut self, command: &str) -> BuildResult {
            self.log.start_association(command)?;
            self.check()
        }
        fn set_mask(&mut self, mask: &str, case_sensitive: bool) -> BuildResult {
            self.log.set_mask(mask, case_sensitive)?;
            self.check()
        }
        fn set_is_hidden(&mut self, value: bool) -> BuildResult {
            self.log.set_is_hidden(value)?;
            self.check()
        }
        fn set_is_symlink(&mut self, value: bool) -> BuildResult {
            self.log.set_is_symlink(value)?;
            self.check()
        }
        fn set_is_readable(&mut self, value: bool) -> BuildResult {
            self.log.set_is_readable(value)?;
            self.check()
        }
        fn set_is_writable(&mut self, value: bool) -> BuildResult {
            self.log.set_is_writable(value)?;
            self.check()
        }
        fn set_is_executable(&mut self, value: bool) -> BuildResult {
            self.log.set_is_executable(value)?;
            self.check()
        }
        fn end_association(&mut self) -> BuildResult {
            self.log.end_association()?;
            self.check()
        }
        fn end_building(&mut self) -> BuildResult {
            self.log.end_building()?;
            if self.end_fails {
                return Err(BuildError::EmptyCommand);
            }
            Ok(())
        }
    }

    /// Hands out `data`, then fails every read after it.
    struct Truncated {
        data: &'static [u8],
    }

    impl Read for Truncated {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.data.is_empty() {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream cut"));
            }
            let n = self.data.len().min(buf.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn full_association_in_document_order() {
        let xml = r#"<assoc><association command="edit"><mask value="*.txt"/><is-readable value="true"/></association></assoc>"#;
        assert_eq!(
            events(xml),
            vec![
                BuildEvent::StartBuilding,
                start("edit"),
                mask("*.txt", true),
                BuildEvent::SetIsReadable { value: true },
                BuildEvent::EndAssociation,
                BuildEvent::EndBuilding,
            ]
        );
    }

    #[test]
    fn stray_close_inside_association_is_ignored() {
        let xml = r#"<association command="a"></b></association>"#;
        assert_eq!(
            events(xml),
            vec![
                BuildEvent::StartBuilding,
                start("a"),
                BuildEvent::EndAssociation,
                BuildEvent::EndBuilding,
            ]
        );
    }

    #[test]
    fn duplicate_close_fires_end_once() {
        let xml = r#"<root><association command="a"></association></association></root>"#;
        let ends = events(xml).iter().filter(|e| **e == BuildEvent::EndAssociation).count();
        assert_eq!(ends, 1);
    }

    #[test]
    fn association_without_command_is_skipped() {
        let xml = r#"<root><association><mask value="*.c"/></association></root>"#;
        assert_eq!(events(xml), vec![BuildEvent::StartBuilding, BuildEvent::EndBuilding]);
    }

    #[test]
    fn empty_command_is_still_reported() {
        let xml = r#"<association command=""/>"#;
        assert_eq!(
            events(xml),
            vec![
                BuildEvent::StartBuilding,
                start(""),
                BuildEvent::EndAssociation,
                BuildEvent::EndBuilding,
            ]
        );
    }

    #[test]
    fn nested_association_is_ignored_until_close() {
        let xml = r#"<root>
            <association command="outer">
                <association command="inner"><mask value="*.in"/></association>
                <mask value="*.out"/>
            </association>
        </root>"#;
        // The inner close ends the outer association; the trailing mask is out of context.
        assert_eq!(
            events(xml),
            vec![
                BuildEvent::StartBuilding,
                start("outer"),
                mask("*.in", true),
                BuildEvent::EndAssociation,
                BuildEvent::EndBuilding,
            ]
        );
    }

    #[test]
    fn mask_case_sensitivity() {
        let xml = r#"<root><association command="a">
            <mask value="one" case-sensitive="true"/>
            <mask value="two" case-sensitive="false"/>
            <mask value="three" case-sensitive="TRUE"/>
            <mask value="four"/>
            <mask case-sensitive="true"/>
        </association></root>"#;
        let masks: Vec<_> = events(xml)
            .into_iter()
            .filter(|e| matches!(e, BuildEvent::SetMask { .. }))
            .collect();
        assert_eq!(
            masks,
            vec![mask("one", true), mask("two", false), mask("three", false), mask("four", true)]
        );
    }

    #[test]
    fn flags_map_to_their_setters() {
        let xml = r#"<root><association command="a">
            <is-hidden value="true"/>
            <is-symlink value="false"/>
            <is-readable value="yes"/>
            <is-writable value="true"/>
            <is-executable value=""/>
            <is-hidden/>
        </association></root>"#;
        assert_eq!(
            events(xml),
            vec![
                BuildEvent::StartBuilding,
                start("a"),
                BuildEvent::SetIsHidden { value: true },
                BuildEvent::SetIsSymlink { value: false },
                BuildEvent::SetIsReadable { value: false },
                BuildEvent::SetIsWritable { value: true },
                BuildEvent::SetIsExecutable { value: false },
                BuildEvent::EndAssociation,
                BuildEvent::EndBuilding,
            ]
        );
    }

    #[test]
    fn out_of_context_and_unknown_elements_are_ignored() {
        let xml = r#"<root>
            <mask value="*.early"/>
            <is-hidden value="true"/>
            <association command="a"><icon value="x.png"/><extra><mask value="*.x"/></extra></association>
            <is-writable value="true"/>
        </root>"#;
        // Elements nested in unknown ones still count while the association is open.
        assert_eq!(
            events(xml),
            vec![
                BuildEvent::StartBuilding,
                start("a"),
                mask("*.x", true),
                BuildEvent::EndAssociation,
                BuildEvent::EndBuilding,
            ]
        );
    }

    #[test]
    fn attribute_values_are_unescaped() {
        let xml = r#"<association command="open &amp; view"><mask value="a&lt;b"/></association>"#;
        let evs = events(xml);
        assert_eq!(evs[1], start("open & view"));
        assert_eq!(evs[2], mask("a<b", true));
    }

    #[test]
    fn syntax_break_still_ends_building() {
        let xml = r#"<assoc><association command="a"><mask value="*.txt"/><is-hidden value="true""#;
        let (result, evs) = trace(xml);
        assert!(matches!(result, Err(AssocError::Xml { .. })), "{result:?}");
        assert_eq!(
            evs,
            vec![
                BuildEvent::StartBuilding,
                start("a"),
                mask("*.txt", true),
                BuildEvent::EndBuilding,
            ]
        );
    }

    #[test]
    fn document_cut_off_mid_association_fails() {
        let xml = r#"<assoc><association command="edit"><mask value="*.txt"/>"#;
        let (result, evs) = trace(xml);
        assert!(matches!(result, Err(AssocError::UnexpectedEof { open: 2, .. })), "{result:?}");
        assert_eq!(
            evs,
            vec![
                BuildEvent::StartBuilding,
                start("edit"),
                mask("*.txt", true),
                BuildEvent::EndBuilding,
            ]
        );
    }

    #[test]
    fn stray_closes_do_not_hide_a_balanced_document() {
        let xml = r#"</x><root><association command="a"></b></association></root></y>"#;
        let (result, _) = trace(xml);
        result.unwrap();
    }

    #[test]
    fn repeated_attribute_is_a_syntax_break() {
        let xml = r#"<root><association command="a" command="b"/></root>"#;
        let (result, evs) = trace(xml);
        assert!(matches!(result, Err(AssocError::Xml { .. })), "{result:?}");
        assert_eq!(evs, vec![BuildEvent::StartBuilding, BuildEvent::EndBuilding]);
    }

    #[test]
    fn repeated_attribute_fails_even_when_not_looked_up() {
        let xml = r#"<association command="a"><mask value="*" case-sensitive="true" x="1" x="2"/></association>"#;
        let (result, _) = trace(xml);
        assert!(matches!(result, Err(AssocError::Xml { .. })), "{result:?}");
    }

    #[test]
    fn builder_error_stops_the_read() {
        let xml = r#"<root>
            <association command="a"><mask value="*.a"/></association>
            <association command="b"><mask value="*.b"/><is-hidden value="true"/></association>
            <association command="c"/>
        </root>"#;
        let mut picky = Picky::new(r#"set_mask("*.b""#);
        let result = read(xml.as_bytes(), &mut picky);
        assert!(matches!(result, Err(AssocError::Build(BuildError::InvalidMask { .. }))));
        assert_eq!(
            picky.log.events,
            vec![
                BuildEvent::StartBuilding,
                start("a"),
                mask("*.a", true),
                BuildEvent::EndAssociation,
                start("b"),
                mask("*.b", true),
                BuildEvent::EndBuilding,
            ]
        );
    }

    #[test]
    fn end_association_error_propagates() {
        let mut picky = Picky::new("end_association");
        let result = read(r#"<association command="a"/>"#.as_bytes(), &mut picky);
        assert!(matches!(result, Err(AssocError::Build(_))));
        assert_eq!(picky.log.events.last(), Some(&BuildEvent::EndBuilding));
    }

    #[test]
    fn failing_start_building_skips_everything_else() {
        let mut picky = Picky::new("start_building");
        let result = read(r#"<association command="a"/>"#.as_bytes(), &mut picky);
        assert!(matches!(result, Err(AssocError::Build(_))));
        assert_eq!(picky.log.events, vec![BuildEvent::StartBuilding]);
    }

    #[test]
    fn first_error_wins_over_cleanup_error() {
        let mut picky = Picky::new("set_mask");
        picky.end_fails = true;
        let xml = r#"<association command="a"><mask value="*"/></association>"#;
        let result = read(xml.as_bytes(), &mut picky);
        assert!(matches!(result, Err(AssocError::Build(BuildError::InvalidMask { .. }))));
    }

    #[test]
    fn cleanup_error_surfaces_when_read_succeeded() {
        let mut picky = Picky::new("never");
        picky.end_fails = true;
        let result = read(r#"<root/>"#.as_bytes(), &mut picky);
        assert!(matches!(result, Err(AssocError::Build(BuildError::EmptyCommand))));
    }

    #[test]
    fn stream_failure_is_an_io_error() {
        let input = Truncated { data: br#"<assoc><association command="a">"# };
        let mut log = EventLog::default();
        let result = read(input, &mut log);
        match result {
            Err(AssocError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("expected an IO error, got {other:?}"),
        }
        assert_eq!(
            log.events,
            vec![BuildEvent::StartBuilding, start("a"), BuildEvent::EndBuilding]
        );
    }

    #[test]
    fn caller_keeps_the_stream() {
        let mut input: &[u8] = br#"<association command="a"/>"#;
        let mut log = EventLog::default();
        read(&mut input, &mut log).unwrap();
        read(&mut input, &mut log).unwrap();
        let builds = log.events.iter().filter(|e| **e == BuildEvent::StartBuilding).count();
        assert_eq!(builds, 2);
    }

    #[test]
    fn flag_lookup_is_exact() {
        assert_eq!(Flag::from_element(b"is-hidden"), Some(Flag::Hidden));
        assert_eq!(Flag::from_element(b"is-executable"), Some(Flag::Executable));
        assert_eq!(Flag::from_element(b"IS-HIDDEN"), None);
        assert_eq!(Flag::from_element(b"mask"), None);
    }
}
