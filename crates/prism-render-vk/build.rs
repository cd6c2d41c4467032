// SPDX-License-Identifier: CEPL-1.0
use std::{env, fs, path::PathBuf};

// Must match the pipeline's vertex layout and descriptor set layout:
//   - binding 0, location 0: R32G32B32_SFLOAT (pos)
//   - binding 0, location 1: R32G32B32_SFLOAT (color)
//   - binding 0, location 2: R32G32_SFLOAT    (tex coord)
//   - set 0, binding 0: uniform block (vertex), binding 1: sampler (fragment)
const VERTEX_SRC: &str = r#"
#version 450
layout(set = 0, binding = 0) uniform UniformBlock {
    mat4 model;
    mat4 view;
    mat4 proj;
} ubo;

layout(location = 0) in vec3 inPosition;
layout(location = 1) in vec3 inColor;
layout(location = 2) in vec2 inTexCoord;

layout(location = 0) out vec3 fragColor;
layout(location = 1) out vec2 fragTexCoord;

void main() {
    gl_Position = ubo.proj * ubo.view * ubo.model * vec4(inPosition, 1.0);
    fragColor = inColor;
    fragTexCoord = inTexCoord;
}
"#;

const FRAGMENT_SRC: &str = r#"
#version 450
layout(set = 0, binding = 1) uniform sampler2D texSampler;

layout(location = 0) in vec3 fragColor;
layout(location = 1) in vec2 fragTexCoord;

layout(location = 0) out vec4 outColor;

void main() {
    outColor = vec4(fragColor * texture(texSampler, fragTexCoord).rgb, 1.0);
}
"#;

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));

    let comp = shaderc::Compiler::new().expect("shaderc compiler");
    let mut opts = shaderc::CompileOptions::new().expect("shaderc options");
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    for (src, kind, name) in [
        (VERTEX_SRC, shaderc::ShaderKind::Vertex, "prism.vert"),
        (FRAGMENT_SRC, shaderc::ShaderKind::Fragment, "prism.frag"),
    ] {
        let spv = comp
            .compile_into_spirv(src, kind, name, "main", Some(&opts))
            .unwrap_or_else(|e| panic!("compile {name}: {e}"));
        fs::write(out.join(format!("{name}.spv")), spv.as_binary_u8())
            .unwrap_or_else(|e| panic!("write {name}.spv: {e}"));
    }

    println!("cargo:rerun-if-changed=build.rs");
}
