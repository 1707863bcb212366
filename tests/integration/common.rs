use cursor_patcher::InstallationPaths;
use std::fs;
use std::path::Path;

/// Minified shape of the accessors as shipped in Cursor 0.45+.
pub const MAIN_JS_UNPATCHED: &str = concat!(
    "\"use strict\";var Ue=class{constructor(t){this.t=t}",
    "async getMachineId(){return this.t.get(\"telemetry.machineId\")??this.fallbackMachineId}",
    "async getMacMachineId(){return this.t.get(\"telemetry.macMachineId\")??this.fallbackMacMachineId}",
    "async getSqmId(){return this.sqm}};"
);

pub const MAIN_JS_PATCHED: &str = concat!(
    "\"use strict\";var Ue=class{constructor(t){this.t=t}",
    "async getMachineId(){return this.fallbackMachineId}",
    "async getMacMachineId(){return this.fallbackMacMachineId}",
    "async getSqmId(){return this.sqm}};"
);

/// Lay out `package.json` and `out/main.js` under `base`.
pub fn mock_install(base: &Path, version: &str, main_js: &str) -> InstallationPaths {
    let paths = InstallationPaths::under(base);
    fs::create_dir_all(paths.target_path.parent().unwrap()).unwrap();
    fs::write(
        &paths.manifest_path,
        format!(
            r#"{{
  "name": "Cursor",
  "version": "{version}",
  "main": "./out/main.js"
}}"#
        ),
    )
    .unwrap();
    fs::write(&paths.target_path, main_js).unwrap();
    paths
}
