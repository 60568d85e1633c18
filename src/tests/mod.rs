// Reclass test infrastructure.
//
// One module per subsystem, bottom-up: the edit buffer and matcher are the
// leaf components, the rewrite tests drive whole-file conversions through
// the same entry point the runner uses, and the runner tests exercise the
// corpus driver against temp directories.

pub mod rewrite_tests;
