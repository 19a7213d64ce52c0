//! Token helpers shared by the parsers, and the option syntax of texture map
//! directives (`map_Bump -s 2 2 1 -bm 0.4 hull normal.png`).

use crate::error::{Diagnostic, DiagnosticKind, ParseError};

/// Return the next token or fail with [`ParseError::MissingArgument`].
pub(crate) fn required<'a>(
    token: Option<&'a str>,
    directive: &str,
    what: &'static str,
    line: usize,
) -> Result<&'a str, ParseError> {
    token.ok_or_else(|| ParseError::MissingArgument {
        directive: directive.to_owned(),
        what,
        line,
    })
}

pub(crate) fn parse_f32(
    token: Option<&str>,
    directive: &str,
    what: &'static str,
    line: usize,
) -> Result<f32, ParseError> {
    let token = required(token, directive, what, line)?;
    token.parse::<f32>().map_err(|_| ParseError::InvalidNumber {
        token: token.to_owned(),
        line,
    })
}

pub(crate) fn parse_vec3<'a, I>(
    tokens: &mut I,
    directive: &str,
    line: usize,
) -> Result<[f32; 3], ParseError>
where
    I: Iterator<Item = &'a str>,
{
    let x = parse_f32(tokens.next(), directive, "first component", line)?;
    let y = parse_f32(tokens.next(), directive, "second component", line)?;
    let z = parse_f32(tokens.next(), directive, "third component", line)?;
    Ok([x, y, z])
}

pub(crate) fn parse_vec2<'a, I>(
    tokens: &mut I,
    directive: &str,
    line: usize,
) -> Result<[f32; 2], ParseError>
where
    I: Iterator<Item = &'a str>,
{
    let u = parse_f32(tokens.next(), directive, "first component", line)?;
    let v = parse_f32(tokens.next(), directive, "second component", line)?;
    Ok([u, v])
}

/// Join all remaining tokens with single spaces. File names may contain
/// spaces, the line has already been split on whitespace.
pub(crate) fn rest_joined<'a, I>(tokens: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let parts: Vec<&str> = tokens.into_iter().collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Result of parsing the arguments of a `map_*` directive.
#[derive(Clone, Debug, PartialEq)]
pub struct MapArgs {
    /// Texture path exactly as written (not yet resolved).
    pub path: String,
    /// `-s u v w`, components not given stay at 1.0.
    pub scale: [f32; 3],
    /// `-bm value`, only meaningful on bump maps.
    pub bump_strength: Option<f32>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Clone, Copy, Debug)]
enum Arity {
    Numbers { min: usize, max: usize },
    Switch,
    Word,
}

fn option_arity(name: &str) -> Option<Arity> {
    match name {
        "-s" | "-o" | "-t" => Some(Arity::Numbers { min: 1, max: 3 }),
        "-bm" | "-texres" | "-boost" => Some(Arity::Numbers { min: 1, max: 1 }),
        "-mm" => Some(Arity::Numbers { min: 2, max: 2 }),
        "-blendu" | "-blendv" | "-clamp" | "-cc" => Some(Arity::Switch),
        "-imfchan" => Some(Arity::Word),
        _ => None,
    }
}

/// Parse `[options] path` following a texture map keyword.
///
/// Options are consumed as long as the next token is a known option name;
/// the first token that is not one starts the path. Only `-s` and `-bm` are
/// kept, the other known options are reported as ignored.
pub fn parse_map_args<'a, I>(tokens: I, directive: &str, line: usize) -> Result<MapArgs, ParseError>
where
    I: IntoIterator<Item = &'a str>,
{
    let tokens: Vec<&str> = tokens.into_iter().collect();
    let mut args = MapArgs {
        path: String::new(),
        scale: [1.0; 3],
        bump_strength: None,
        diagnostics: Vec::new(),
    };

    let mut i = 0;
    while let Some(&name) = tokens.get(i) {
        let Some(arity) = option_arity(name) else {
            break;
        };
        i += 1;

        match arity {
            Arity::Numbers { min, max } => {
                let mut values = Vec::with_capacity(max);
                while values.len() < max {
                    match tokens.get(i).and_then(|t| t.parse::<f32>().ok()) {
                        Some(v) => {
                            values.push(v);
                            i += 1;
                        }
                        None => break,
                    }
                }
                if values.len() < min {
                    return Err(match tokens.get(i) {
                        Some(token) => ParseError::InvalidNumber {
                            token: (*token).to_owned(),
                            line,
                        },
                        None => ParseError::MissingArgument {
                            directive: directive.to_owned(),
                            what: "option value",
                            line,
                        },
                    });
                }

                match name {
                    "-s" => {
                        for (dst, v) in args.scale.iter_mut().zip(&values) {
                            *dst = *v;
                        }
                    }
                    "-bm" => args.bump_strength = Some(values[0]),
                    _ => args.diagnostics.push(Diagnostic::report(
                        line,
                        DiagnosticKind::IgnoredOption(name.to_owned()),
                    )),
                }
            }
            Arity::Switch => {
                match tokens.get(i) {
                    Some(&"on") | Some(&"off") => i += 1,
                    _ => {
                        return Err(ParseError::MissingArgument {
                            directive: directive.to_owned(),
                            what: "'on' or 'off' after option",
                            line,
                        });
                    }
                }
                args.diagnostics.push(Diagnostic::report(
                    line,
                    DiagnosticKind::IgnoredOption(name.to_owned()),
                ));
            }
            Arity::Word => {
                required(tokens.get(i).copied(), directive, "option value", line)?;
                i += 1;
                args.diagnostics.push(Diagnostic::report(
                    line,
                    DiagnosticKind::IgnoredOption(name.to_owned()),
                ));
            }
        }
    }

    args.path = required(
        rest_joined(tokens[i..].iter().copied()).as_deref(),
        directive,
        "texture path",
        line,
    )?
    .to_owned();

    Ok(args)
}
