pub mod ffprobe;
