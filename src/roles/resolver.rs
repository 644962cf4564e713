// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Getting answers to questions raised while repairing field roles.

use std::{
    collections::VecDeque,
    io::{BufRead, StdinLock, Stdout, Write},
};

use itertools::Itertools;
use thiserror::Error;

/// What sort of answer is wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    FieldName,
    AntennaName,
    FluxModel,
    TargetName,
    YesNo,
}

/// A request for input.
#[derive(Debug, Clone, PartialEq)]
pub struct NeedsInput {
    pub kind: InputKind,
    pub question: String,

    /// Used if the answer is blank.
    pub default: Option<String>,

    /// The expected answers, if there's a fixed set of them.
    pub choices: Vec<String>,
}

impl NeedsInput {
    pub fn new<S: Into<String>>(kind: InputKind, question: S) -> NeedsInput {
        NeedsInput {
            kind,
            question: question.into(),
            default: None,
            choices: vec![],
        }
    }

    pub fn yes_no<S: Into<String>>(question: S) -> NeedsInput {
        NeedsInput::new(InputKind::YesNo, question)
    }

    /// Set a default. Blank defaults are ignored.
    pub fn default_answer<S: Into<String>>(mut self, default: S) -> NeedsInput {
        let default = default.into();
        self.default = if default.is_empty() {
            None
        } else {
            Some(default)
        };
        self
    }

    pub fn choices<I, S>(mut self, choices: I) -> NeedsInput
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(|s| s.into()).collect();
        self
    }
}

/// Interpret a yes/no answer. Anything unrecognised is `None`.
pub fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "ye" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Something that can answer [`NeedsInput`] requests.
pub trait Resolver {
    /// If this is false, repairs needing input aren't attempted and their
    /// problems are fatal.
    fn is_interactive(&self) -> bool;

    fn resolve(&mut self, request: &NeedsInput) -> Result<String, ResolveError>;
}

impl<R: Resolver + ?Sized> Resolver for &mut R {
    fn is_interactive(&self) -> bool {
        (**self).is_interactive()
    }

    fn resolve(&mut self, request: &NeedsInput) -> Result<String, ResolveError> {
        (**self).resolve(request)
    }
}

impl<R: Resolver + ?Sized> Resolver for Box<R> {
    fn is_interactive(&self) -> bool {
        (**self).is_interactive()
    }

    fn resolve(&mut self, request: &NeedsInput) -> Result<String, ResolveError> {
        (**self).resolve(request)
    }
}

/// Never interactive; nothing can be asked.
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchResolver;

impl Resolver for BatchResolver {
    fn is_interactive(&self) -> bool {
        false
    }

    fn resolve(&mut self, request: &NeedsInput) -> Result<String, ResolveError> {
        Err(ResolveError::NonInteractive {
            question: request.question.clone(),
        })
    }
}

/// Asks questions on a terminal.
pub struct TerminalResolver<R, W> {
    input: R,
    output: W,
}

impl TerminalResolver<StdinLock<'static>, Stdout> {
    /// Use stdin and stdout.
    pub fn stdio() -> Self {
        TerminalResolver {
            input: std::io::stdin().lock(),
            output: std::io::stdout(),
        }
    }
}

impl<R: BufRead, W: Write> TerminalResolver<R, W> {
    pub fn new(input: R, output: W) -> TerminalResolver<R, W> {
        TerminalResolver { input, output }
    }

    fn prompt(&mut self, request: &NeedsInput) -> std::io::Result<Option<String>> {
        if !request.choices.is_empty() && request.kind != InputKind::YesNo {
            writeln!(
                self.output,
                "\nValid choices:\n{}\n",
                request.choices.iter().join(", ")
            )?;
        }
        match &request.default {
            Some(d) => write!(self.output, "{} [{d}]: ", request.question)?,
            None => write!(self.output, "{}: ", request.question)?,
        }
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

impl<R: BufRead, W: Write> Resolver for TerminalResolver<R, W> {
    fn is_interactive(&self) -> bool {
        true
    }

    fn resolve(&mut self, request: &NeedsInput) -> Result<String, ResolveError> {
        match self.prompt(request)? {
            Some(answer) => Ok(answer),
            None => Err(ResolveError::EndOfInput {
                question: request.question.clone(),
            }),
        }
    }
}

/// Answers questions from a queue. All questions asked are kept.
#[derive(Debug, Default, Clone)]
pub struct ScriptedResolver {
    answers: VecDeque<String>,
    asked: Vec<NeedsInput>,
}

impl ScriptedResolver {
    pub fn new<I, S>(answers: I) -> ScriptedResolver
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedResolver {
            answers: answers.into_iter().map(|s| s.into()).collect(),
            asked: vec![],
        }
    }

    pub fn asked(&self) -> &[NeedsInput] {
        &self.asked
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Resolver for ScriptedResolver {
    fn is_interactive(&self) -> bool {
        true
    }

    fn resolve(&mut self, request: &NeedsInput) -> Result<String, ResolveError> {
        self.asked.push(request.clone());
        self.answers
            .pop_front()
            .ok_or_else(|| ResolveError::EndOfInput {
                question: request.question.clone(),
            })
    }
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Input is needed to continue, but running non-interactively. The question was: {question}")]
    NonInteractive { question: String },

    #[error("Reached the end of input while waiting for an answer to: {question}")]
    EndOfInput { question: String },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
