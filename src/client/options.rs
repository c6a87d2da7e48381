//! Connection string parsing for the read concern and write concern options.


use strsim::jaro_winkler;

use crate::{
    concern::{Acknowledgment, ReadConcern, ReadConcernLevel, WriteConcern},
    error::{Error, Result},
    trace::{TracingRepresentation, CONCERN_TRACING_EVENT_TARGET},
    tri_state::TriState,
};

const DEFAULT_PORT: u16 = 27017;

/// The connection string options owned by the concern subsystem, lowercased.
const URI_CONCERN_OPTIONS: &[&str] = &["journal", "readconcernlevel", "w", "wtimeoutms"];

/// Options whose repetition in a connection string is meaningful.
const REPEATABLE_URI_OPTIONS: &[&str] = &["readpreferencetags"];

const USERINFO_RESERVED_CHARACTERS: &[char] = &[':', '/', '?', '#', '[', ']', '@'];

const ILLEGAL_DATABASE_CHARACTERS: &[char] = &['/', '\\', ' ', '"', '$', '.'];

/// The concern options found in a connection string, before they are combined into a
/// [`WriteConcern`] and a [`ReadConcern`].
///
/// Each field records whether its key was present at all, so `journal=false` can be told apart
/// from a connection string that never mentions `journal`. Options this type doesn't own are
/// kept, untouched and in order, for other extractors.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct UriConcernOptions {
    /// The `w` option.
    pub w: TriState<Acknowledgment>,

    /// The `wtimeoutMS` option, in milliseconds.
    pub w_timeout: TriState<i64>,

    /// The `journal` option.
    pub journal: TriState<bool>,

    /// The `readConcernLevel` option.
    pub read_concern_level: TriState<ReadConcernLevel>,

    passthrough: Vec<(String, String)>,
}

impl UriConcernOptions {
    /// Reads the `w`, `wtimeoutMS`, `journal` and `readConcernLevel` options out of a sequence
    /// of connection string key/value pairs. Keys are matched case-insensitively and values are
    /// expected to already be percent-decoded.
    ///
    /// A malformed value for one of these keys, or one of these keys appearing twice, is an
    /// [`ErrorKind::Parse`](crate::error::ErrorKind::Parse) error naming the key. Other keys are
    /// never an error here; they are available afterwards from
    /// [`UriConcernOptions::passthrough`].
    ///
    /// The values are not validated against each other; see
    /// [`UriConcernOptions::write_concern`].
    pub fn extract<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::default();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());

            match key.to_lowercase().as_str() {
                "w" => {
                    check_not_repeated(&options.w, "w")?;
                    options.w = TriState::set(parse_w(value)?);
                }
                "wtimeoutms" => {
                    check_not_repeated(&options.w_timeout, "wtimeoutMS")?;
                    let millis = value.parse::<i64>().map_err(|_| {
                        Error::parse(
                            "wtimeoutMS",
                            format!("`{}` is not an integer number of milliseconds", value),
                        )
                    })?;
                    options.w_timeout = TriState::set(millis);
                }
                "journal" => {
                    check_not_repeated(&options.journal, "journal")?;
                    options.journal = TriState::set(parse_bool(value, "journal")?);
                }
                "readconcernlevel" => {
                    check_not_repeated(&options.read_concern_level, "readConcernLevel")?;
                    options.read_concern_level = TriState::set(ReadConcernLevel::from_str(value));
                }
                _ => options
                    .passthrough
                    .push((key.to_string(), value.to_string())),
            }
        }

        Ok(options)
    }

    /// Whether the `w` key was present.
    pub fn w_set(&self) -> bool {
        self.w.is_present()
    }

    /// Whether the `wtimeoutMS` key was present.
    pub fn w_timeout_set(&self) -> bool {
        self.w_timeout.is_present()
    }

    /// Whether the `journal` key was present.
    pub fn journal_set(&self) -> bool {
        self.journal.is_present()
    }

    /// Whether the `readConcernLevel` key was present.
    pub fn read_concern_level_set(&self) -> bool {
        self.read_concern_level.is_present()
    }

    /// The key/value pairs not owned by the concern subsystem, in their original order.
    pub fn passthrough(&self) -> &[(String, String)] {
        &self.passthrough
    }

    /// Combines the write concern options into a validated [`WriteConcern`]. If none of them
    /// were present, this is the server default.
    pub fn write_concern(&self) -> Result<WriteConcern> {
        let write_concern = WriteConcern {
            w: self.w.clone(),
            w_timeout: self.w_timeout,
            journal: self.journal,
        };
        write_concern.validate()?;
        Ok(write_concern)
    }

    /// The [`ReadConcern`] described by the `readConcernLevel` option. If it wasn't present, this
    /// is the server default.
    pub fn read_concern(&self) -> Result<ReadConcern> {
        let read_concern = ReadConcern {
            level: self.read_concern_level.clone(),
        };
        read_concern.validate()?;
        Ok(read_concern)
    }
}

fn check_not_repeated<T>(field: &TriState<T>, key: &str) -> Result<()> {
    if field.is_present() {
        return Err(Error::parse(
            key,
            "repeated options are not allowed in the connection string",
        ));
    }
    Ok(())
}

/// A value made only of digits is a node count (so "01" is 1); a minus sign followed by digits
/// is a negative node count, which validation will reject. Anything else is a tag.
fn parse_w(value: &str) -> Result<Acknowledgment> {
    let digits = value.strip_prefix('-').unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(Acknowledgment::from(value));
    }

    value
        .parse::<i32>()
        .map(Acknowledgment::Nodes)
        .map_err(|_| Error::parse("w", format!("`{}` is out of range", value)))
}

fn parse_bool(value: &str, key: &str) -> Result<bool> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(Error::parse(
            key,
            format!("`{}` is not a boolean, expected `true` or `false`", value),
        ))
    }
}

/// A hostname:port address pair.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct ServerAddress {
    /// The hostname of the address.
    pub host: String,

    /// The port of the address. The default is 27017.
    pub port: Option<u16>,
}

impl ServerAddress {
    /// The port, or the default port if none was specified.
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    fn parse(address: &str) -> Result<Self> {
        let (host, port) = match address.rfind(':') {
            Some(index) => {
                let (host, port) = address.split_at(index);
                (host, Some(&port[1..]))
            }
            None => (address, None),
        };

        if host.is_empty() {
            return Err(Error::invalid_argument(
                "connection string contains no host",
            ));
        }

        let port = match port {
            Some(port) => match port.parse::<u16>() {
                Ok(p) if p != 0 => Some(p),
                _ => {
                    return Err(Error::invalid_argument(format!(
                        "invalid port specified in connection string: {}",
                        port
                    )))
                }
            },
            None => None,
        };

        Ok(Self {
            host: host.to_lowercase(),
            port,
        })
    }
}

/// A parsed MongoDB connection string.
///
/// Only the pieces needed to locate the concern options are interpreted: hosts, credentials and
/// the default database are split out, and the options are handed to
/// [`UriConcernOptions::extract`]. Every other option is kept verbatim.
///
/// ```rust
/// # use mongodb_concern::{options::{Acknowledgment, ConnectionString}, TriState};
/// let conn_str = ConnectionString::parse("mongodb://localhost/?w=majority&journal=false")?;
/// assert_eq!(conn_str.write_concern.w(), &TriState::Present(Acknowledgment::Majority));
/// assert_eq!(conn_str.write_concern.journal(), TriState::Present(false));
/// assert!(conn_str.read_concern.is_server_default());
/// # Ok::<(), mongodb_concern::error::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct ConnectionString {
    /// Whether the connection string used the `mongodb+srv` scheme.
    pub srv: bool,

    /// The hosts listed in the connection string.
    pub hosts: Vec<ServerAddress>,

    /// The percent-decoded username, if any.
    pub username: Option<String>,

    /// The percent-decoded password, if any.
    pub password: Option<String>,

    /// The default database, if any.
    pub default_database: Option<String>,

    /// The validated write concern. The server default if no write concern option was present.
    pub write_concern: WriteConcern,

    /// The read concern. The server default if `readConcernLevel` was not present.
    pub read_concern: ReadConcern,

    /// The raw concern options, including which keys were present and the options owned by
    /// other parts of the client.
    pub concern_options: UriConcernOptions,
}

impl ConnectionString {
    /// Parses a connection string. An invalid value for any concern option rejects the whole
    /// connection string rather than falling back to the server default.
    pub fn parse(s: &str) -> Result<Self> {
        let end_of_scheme = s
            .find("://")
            .ok_or_else(|| Error::invalid_argument("connection string contains no scheme"))?;

        let srv = match &s[..end_of_scheme] {
            "mongodb" => false,
            "mongodb+srv" => true,
            other => {
                return Err(Error::invalid_argument(format!(
                    "invalid connection string scheme: {}",
                    other
                )))
            }
        };

        let after_scheme = &s[end_of_scheme + 3..];

        let (pre_slash, post_slash) = match after_scheme.find('/') {
            Some(slash_index) => match exclusive_split_at(after_scheme, slash_index) {
                (Some(section), o) => (section, o),
                (None, _) => return Err(Error::invalid_argument("missing hosts")),
            },
            None => {
                if after_scheme.contains('?') {
                    return Err(Error::invalid_argument(
                        "missing delimiting slash between hosts and options",
                    ));
                }
                (after_scheme, None)
            }
        };

        let (database, options_section) = match post_slash {
            Some(section) => match section.find('?') {
                Some(index) => exclusive_split_at(section, index),
                None => (post_slash, None),
            },
            None => (None, None),
        };

        let default_database = match database {
            Some(db) => {
                let decoded = percent_decode(db, "database name must be URL encoded")?;
                if decoded.contains(ILLEGAL_DATABASE_CHARACTERS) {
                    return Err(Error::invalid_argument(
                        "illegal character in database name",
                    ));
                }
                Some(decoded)
            }
            None => None,
        };

        let (cred_section, hosts_section) = match pre_slash.rfind('@') {
            Some(index) => match exclusive_split_at(pre_slash, index) {
                (creds, Some(hosts)) => (creds, hosts),
                (_, None) => return Err(Error::invalid_argument("missing hosts")),
            },
            None => (None, pre_slash),
        };

        let (username, password) = match cred_section {
            Some(creds) => match creds.find(':') {
                Some(index) => match exclusive_split_at(creds, index) {
                    (username, None) => (username, Some("")),
                    (username, password) => (username, password),
                },
                None => (Some(creds), None),
            },
            None => (None, None),
        };
        let username = username
            .map(|u| decode_userinfo(u, "username"))
            .transpose()?;
        let password = password
            .map(|p| decode_userinfo(p, "password"))
            .transpose()?;

        let hosts = hosts_section
            .split(',')
            .map(ServerAddress::parse)
            .collect::<Result<Vec<_>>>()?;

        if srv {
            if hosts.len() != 1 {
                return Err(Error::invalid_argument(
                    "exactly one host must be specified with 'mongodb+srv'",
                ));
            }
            if hosts[0].port.is_some() {
                return Err(Error::invalid_argument(
                    "a port cannot be specified with 'mongodb+srv'",
                ));
            }
        }

        let pairs = match options_section {
            Some(options) => split_options(options)?,
            None => Vec::new(),
        };
        let concern_options = UriConcernOptions::extract(pairs)?;
        check_passthrough_not_repeated(concern_options.passthrough())?;

        for (key, _) in concern_options.passthrough() {
            suggest_concern_option(key);
        }

        let write_concern = concern_options.write_concern()?;
        let read_concern = concern_options.read_concern()?;

        tracing::debug!(
            target: CONCERN_TRACING_EVENT_TARGET,
            writeConcern = write_concern.tracing_representation(),
            readConcern = read_concern.tracing_representation(),
            "Concern options parsed from connection string",
        );

        Ok(Self {
            srv,
            hosts,
            username,
            password,
            default_database,
            write_concern,
            read_concern,
            concern_options,
        })
    }
}

/// Splits the options section into percent-decoded key/value pairs, preserving order.
fn split_options(options: &str) -> Result<Vec<(String, String)>> {
    if options.is_empty() {
        return Ok(Vec::new());
    }

    options
        .split('&')
        .map(|option_pair| {
            let (key, value) = option_pair.split_once('=').ok_or_else(|| {
                Error::invalid_argument(format!(
                    "connection string options is not a `key=value` pair: {}",
                    option_pair,
                ))
            })?;
            let value = percent_decode(
                value,
                &format!("connection string option `{}` must be URL encoded", key),
            )?;
            Ok((key.to_string(), value))
        })
        .collect()
}

fn check_passthrough_not_repeated(pairs: &[(String, String)]) -> Result<()> {
    let mut seen: Vec<String> = Vec::with_capacity(pairs.len());
    for (key, _) in pairs {
        let key = key.to_lowercase();
        if REPEATABLE_URI_OPTIONS.contains(&key.as_str()) {
            continue;
        }
        if seen.contains(&key) {
            return Err(Error::invalid_argument(format!(
                "repeated options are not allowed in the connection string: {}",
                key
            )));
        }
        seen.push(key);
    }
    Ok(())
}

/// Emits a trace event when an option that will be passed through looks like a misspelled
/// concern option.
fn suggest_concern_option(key: &str) {
    let key = key.to_lowercase();
    let (similarity, option) = URI_CONCERN_OPTIONS
        .iter()
        .fold((0.0, ""), |acc, option| {
            let similarity = jaro_winkler(option, &key).abs();
            if similarity > acc.0 {
                (similarity, *option)
            } else {
                acc
            }
        });

    if similarity >= 0.84 {
        tracing::debug!(
            target: CONCERN_TRACING_EVENT_TARGET,
            option = key.as_str(),
            suggestion = option,
            "Connection string option is not a concern option but resembles one",
        );
    }
}

/// Splits a string into a section before a given index and a section exclusively after the index.
/// Empty portions are returned as `None`.
fn exclusive_split_at(s: &str, i: usize) -> (Option<&str>, Option<&str>) {
    let (l, r) = s.split_at(i);

    let lout = if !l.is_empty() { Some(l) } else { None };
    let rout = if r.len() > 1 { Some(&r[1..]) } else { None };

    (lout, rout)
}

fn percent_decode(s: &str, err_message: &str) -> Result<String> {
    match percent_encoding::percent_decode_str(s).decode_utf8() {
        Ok(result) => Ok(result.to_string()),
        Err(_) => Err(Error::invalid_argument(err_message)),
    }
}

fn decode_userinfo(s: &str, userinfo_type: &str) -> Result<String> {
    if s.contains(USERINFO_RESERVED_CHARACTERS) {
        return Err(Error::invalid_argument(format!(
            "{} must be URL encoded",
            userinfo_type
        )));
    }

    // Every '%' must start a percent-encoded byte, i.e. be followed by two hexadecimal digits.
    if s.split('%').skip(1).any(|part| {
        part.get(..2)
            .is_none_or(|hex| !hex.chars().all(|c| c.is_ascii_hexdigit()))
    }) {
        return Err(Error::invalid_argument(format!(
            "{} cannot contain unescaped %",
            userinfo_type
        )));
    }

    percent_decode(s, &format!("{} must be URL encoded", userinfo_type))
}
