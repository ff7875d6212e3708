//! Integration test harness for the benchsweep workspace.
