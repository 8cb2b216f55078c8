mod config_it;
mod recovery_position_it;
mod segment_rotation_it;
