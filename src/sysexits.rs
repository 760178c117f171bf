//! legacy exit status codes for system programs.
//! reference: [SYSEXITS](https://man.freebsd.org/cgi/man.cgi?query=sysexits&apropos=0&sektion=0&manpath=FreeBSD+11.2-stable&arch=default&format=html)

/// value: 66 <br>
/// The configuration file or the targets file did not exist or was not readable.
pub const EX_NOINPUT: i32 = 66;

/// value: 70 <br>
/// An internal software error has been detected.
pub const EX_SOFTWARE: i32 = 70;

/// value: 73 <br>
/// The run log file cannot be created or opened for appending.
pub const EX_CANTCREAT: i32 = 73;

/// value: 74 <br>
/// At least one target failed to back up.
pub const EX_IOERR: i32 = 74;

/// value: 75 <br>
/// The run was interrupted before every target was backed up. Running it again later is expected to work.
pub const EX_TEMPFAIL: i32 = 75;

/// value: 78 <br>
/// The configuration is malformed, incomplete, or names a target that does not exist.
pub const EX_CONFIG: i32 = 78;
