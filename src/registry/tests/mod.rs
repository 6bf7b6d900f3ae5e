//! Registry warm-up and construction tests.
