use launchpad_application::view::PluginRegistry;

/// Prints the component keys a custom agent may name in `config.component`.
pub fn list() {
    let registry = PluginRegistry::with_builtin_plugins();
    println!("Registered view plugins:");
    for key in registry.keys() {
        println!("  {key}");
    }
}
