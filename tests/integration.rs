// Integration tests module

mod integration {
    mod support;

    mod collector_test;
    mod settings_test;
}
